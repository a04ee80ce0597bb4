use std::sync::Arc;

use clap::Parser;

use grader::broadcaster::Broadcaster;
use grader::config::{CliArgs, GlobalConfig};
use grader::orchestrator::Orchestrator;
use grader::queue::JobQueue;
use grader::sandbox::BoxIdPool;
use grader::web_server::build_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let global = Arc::new(
        GlobalConfig::load(&cli.base_path).expect("failed to load global configuration"),
    );

    let box_pool = Arc::new(BoxIdPool::new(global.box_pool_size));
    let job_queue = Arc::new(JobQueue::new(
        global.clone(),
        box_pool.clone(),
        global.grading_workers,
    ));
    let broadcaster = Broadcaster::spawn(global.sync_base_url());

    let submission_permits = Arc::new(tokio::sync::Semaphore::new(global.submission_workers));

    let orchestrator = Arc::new(Orchestrator {
        global: global.clone(),
        base_path: cli.base_path.clone(),
        tmp_base: cli.tmp_path.clone(),
        job_queue,
        broadcaster,
        submission_permits,
    });

    log::info!("listening on port {}", global.listen_port);
    build_server(orchestrator, global.listen_port)?.await
}
