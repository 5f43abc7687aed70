#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    mess_backend::init_tracing();

    mess_backend::run().await
}
