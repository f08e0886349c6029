use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::http::connection::{Connection, Handler};

/// State shared between a [`ServerHandle`] and its accept loop.
#[derive(Default)]
struct Shutdown {
    closed: AtomicBool,
    notify: Notify,
}

/// Handle to a running server. Dropping it does not stop the server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Arc<Shutdown>,
    accept_loop: Option<JoinHandle<anyhow::Result<()>>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.closed.load(Ordering::SeqCst)
    }

    /// Stops accepting and closes the listening socket.
    ///
    /// Connections that were already accepted keep running to completion.
    /// Returns the accept loop's error if it had died on its own.
    pub async fn close(&mut self) -> anyhow::Result<()> {
        self.shutdown.closed.store(true, Ordering::SeqCst);
        self.shutdown.notify.notify_one();

        match self.accept_loop.take() {
            Some(task) => task.await.context("accept loop panicked")?,
            None => Ok(()),
        }
    }
}

/// Binds `addr` and serves every connection with `handler`, one task each.
pub async fn serve<A, H>(addr: A, handler: H) -> anyhow::Result<ServerHandle>
where
    A: ToSocketAddrs,
    H: Handler,
{
    serve_with_limit(addr, handler, None).await
}

/// Like [`serve`], optionally capping in-flight connections.
///
/// With a limit the accept loop waits for a free slot before accepting, so
/// excess clients queue in the kernel backlog instead of getting a task.
pub async fn serve_with_limit<A, H>(
    addr: A,
    handler: H,
    max_connections: Option<usize>,
) -> anyhow::Result<ServerHandle>
where
    A: ToSocketAddrs,
    H: Handler,
{
    let listener = TcpListener::bind(addr).await.context("failed to bind listener")?;
    let local_addr = listener.local_addr()?;
    info!("Listening on {}", local_addr);

    let shutdown = Arc::new(Shutdown::default());
    let limit = max_connections.map(|n| Arc::new(Semaphore::new(n)));
    let accept_loop = tokio::spawn(accept_loop(
        listener,
        Arc::new(handler),
        Arc::clone(&shutdown),
        limit,
    ));

    Ok(ServerHandle {
        local_addr,
        shutdown,
        accept_loop: Some(accept_loop),
    })
}

async fn accept_loop<H: Handler>(
    listener: TcpListener,
    handler: Arc<H>,
    shutdown: Arc<Shutdown>,
    limit: Option<Arc<Semaphore>>,
) -> anyhow::Result<()> {
    loop {
        let permit = match &limit {
            Some(semaphore) => tokio::select! {
                permit = Arc::clone(semaphore).acquire_owned() => Some(permit?),
                _ = shutdown.notify.notified() => break,
            },
            None => None,
        };

        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = shutdown.notify.notified() => break,
        };

        let (socket, peer) = match accepted {
            Ok(conn) => conn,
            Err(_) if shutdown.closed.load(Ordering::SeqCst) => break,
            Err(e) => {
                error!(error = %e, "accept failed, listener stopping");
                return Err(e).context("error accepting connection");
            }
        };
        debug!("Accepted connection from {}", peer);

        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = Connection::new(socket, peer).run(handler.as_ref()).await {
                error!("Connection error from {}: {:#}", peer, e);
            }
        });
    }

    debug!("accept loop stopped");
    Ok(())
}
