use std::env;
use std::sync::Arc;
use std::time::Duration;

use motuka::api::DynAPI;
use motuka::db::PgPool;
use motuka::engine::{run_sweeper, Engine};
use motuka::external::HttpPush;
use motuka::server::serve;

const SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let db_uri = env::var("DATABASE_URL").unwrap();

    let PgPool(pool) = PgPool::new(&db_uri, 5).await.unwrap();

    let push = Arc::new(HttpPush::from_env().unwrap());

    let engine = Arc::new(Engine::new(pool, push).await.unwrap());

    tokio::spawn(run_sweeper(engine.clone(), SWEEP_PERIOD));

    serve(engine as DynAPI).await;
}
