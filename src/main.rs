#[macro_use]
extern crate rocket;

use airline_reservation_core::build_rocket;
use dotenv::dotenv;

#[launch]
async fn rocket() -> _ {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    build_rocket().await
}
