//! Minimal gated server: a single `/ping` endpoint behind the admission gate
//! and a request-logging decorator.

use std::sync::Arc;

use log::info;
use ntex::{web, Middleware, Service, ServiceCtx};
use ntex_ipgate::{spawn_sweeper, ClientRegistry, IpGate};

/// Logs one line per request before handing it on.
struct RequestLog;

impl<S> Middleware<S> for RequestLog {
    type Service = RequestLogService<S>;

    fn create(&self, service: S) -> Self::Service {
        RequestLogService { service }
    }
}

struct RequestLogService<S> {
    service: S,
}

impl<S, Err> Service<web::WebRequest<Err>> for RequestLogService<S>
where
    S: Service<web::WebRequest<Err>, Response = web::WebResponse, Error = web::Error> + 'static,
    Err: web::ErrorRenderer,
{
    type Response = web::WebResponse;
    type Error = web::Error;

    async fn call(
        &self,
        req: web::WebRequest<Err>,
        ctx: ServiceCtx<'_, Self>,
    ) -> Result<Self::Response, Self::Error> {
        let peer = req
            .connection_info()
            .remote()
            .map(str::to_owned)
            .unwrap_or_else(|| "-".to_string());
        info!("{} {} from {}", req.method(), req.path(), peer);

        ctx.call(&self.service, req).await
    }
}

async fn ping() -> &'static str {
    "Hello World"
}

#[ntex::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let registry = Arc::new(ClientRegistry::new());
    let sweeper = spawn_sweeper(Arc::clone(&registry));

    info!("listening on 127.0.0.1:8080");
    web::HttpServer::new(move || {
        web::App::new()
            // later .wrap()s run first, so RequestLog sees throttled requests too
            .wrap(IpGate::new(Arc::clone(&registry)))
            .wrap(RequestLog)
            .service(web::resource("/ping").to(ping))
    })
    .bind("127.0.0.1:8080")?
    .run()
    .await?;

    sweeper.stop().await;
    info!("shut down");
    Ok(())
}
