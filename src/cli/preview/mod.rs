//! Local preview of the mirror.

mod lifecycle;
mod path;
mod response;

use anyhow::{Result, bail};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Request, Server};

use crate::{config::SiteConfig, core, debug, log};

/// Worker threads answering requests.
const WORKERS: usize = 4;

/// Serve the mirror directory until Ctrl+C.
pub fn serve_site(config: &SiteConfig) -> Result<()> {
    let root = config.output_dir().to_path_buf();
    if !root.is_dir() {
        bail!(
            "mirror directory {} does not exist, run `phantom generate` first",
            root.display()
        );
    }

    let (server, addr) = lifecycle::bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);
    core::register_server(Arc::clone(&server));

    log!("serve"; "http://{} ({})", addr, root.display());
    run_request_loop(&server, Arc::new(root))?;
    Ok(())
}

fn run_request_loop(server: &Server, root: Arc<PathBuf>) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(WORKERS)
        .build()?;

    for request in server.incoming_requests() {
        let root = Arc::clone(&root);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &root) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

/// Handle a single HTTP request
fn handle_request(request: Request, root: &Path) -> Result<()> {
    if core::is_shutdown() {
        return response::respond_unavailable(request);
    }

    debug!("serve"; "{} {}", request.method(), request.url());
    match path::resolve_path(request.url(), root) {
        Some(file) => response::respond_file(request, &file),
        None => response::respond_not_found(request, root),
    }
}
