use std::time::Instant;
use surf::middleware::{Middleware, Next};
use surf::{Client, Request, Response, Result};

/// Logs every request going through a surf client together with its status and duration
#[derive(Debug, Default, Clone, Copy)]
pub struct SurfLogging;

#[surf::utils::async_trait]
impl Middleware for SurfLogging {
    async fn handle(&self, req: Request, client: Client, next: Next<'_>) -> Result<Response> {
        let method = req.method();
        let url = req.url().to_string();
        let start = Instant::now();

        log::debug!("{} {}", method, url);
        let res = next.run(req, client).await;
        let elapsed = start.elapsed();

        match &res {
            Ok(response) => log::debug!(
                "{} {} -> {} ({:?})",
                method,
                url,
                response.status(),
                elapsed
            ),
            Err(err) => log::warn!("{} {} failed after {:?}: {}", method, url, elapsed, err),
        }

        res
    }
}
