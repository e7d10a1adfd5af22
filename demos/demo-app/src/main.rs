use restree::prelude::*;

mod api;

#[tokio::main]
async fn main() {
    restree::init_tracing();

    let router = match Router::new(api::initial()) {
        Ok(router) => router,
        Err(err) => {
            tracing::error!(%err, "invalid resource hierarchy");
            std::process::exit(1);
        }
    };

    println!("{router}");

    if let Err(err) = router.serve("0.0.0.0:3000").await {
        tracing::error!(%err, "server stopped");
        std::process::exit(1);
    }
}
