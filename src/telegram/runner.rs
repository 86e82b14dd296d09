//! Update delivery: long polling or webhook, alongside the HTTP server

use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use teloxide::update_listeners::Polling;
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinHandle};
use url::Url;

use super::handlers::{schema, HandlerDeps};
use crate::core::web_server::{bind_web_server, serve_web_server};

/// How many times a panicked polling dispatcher is restarted
const MAX_DISPATCHER_RESTARTS: u32 = 5;

/// Completes on ctrl-c.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down gracefully...");
}

async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    bind_web_server(port)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind HTTP port {}: {}", port, e))
}

fn spawn_web_server<F>(listener: TcpListener, app: Router, shutdown: F) -> JoinHandle<std::io::Result<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let served = serve_web_server(listener, app, shutdown).await;
        if let Err(e) = &served {
            log::error!("❌ Web server stopped: {}", e);
        }
        served
    })
}

/// Whichever of the two long-running tasks finished first
enum Stopped {
    Dispatcher(Result<(), JoinError>),
    Server(Result<std::io::Result<()>, JoinError>),
}

/// Ok when the server finished its graceful shutdown.
fn server_result(joined: Result<std::io::Result<()>, JoinError>) -> anyhow::Result<()> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(anyhow::anyhow!("Web server failed: {}", e)),
        Err(e) => Err(anyhow::anyhow!("Web server task ended: {}", e)),
    }
}

/// Polling mode: drops any stale webhook, then long-polls while `web_app`
/// keeps serving health and payment callbacks. A failing web server stops
/// the bot too.
pub async fn run_polling(bot: Bot, deps: HandlerDeps, web_app: Router, port: u16) -> anyhow::Result<()> {
    let listener = bind(port).await?;

    log::info!("Starting bot in long polling mode");
    bot.delete_webhook().drop_pending_updates(true).await?;

    let mut server = spawn_web_server(listener, web_app, shutdown_signal());

    let mut restarts = 0;
    loop {
        let bot_clone = bot.clone();
        let handler = schema(deps.clone());

        // A panic inside the dispatcher surfaces through the JoinHandle
        let mut handle = tokio::spawn(async move {
            let listener = Polling::builder(bot_clone.clone()).drop_pending_updates().build();

            Dispatcher::builder(bot_clone, handler)
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        });

        let stopped = tokio::select! {
            joined = &mut handle => Stopped::Dispatcher(joined),
            served = &mut server => Stopped::Server(served),
        };
        let joined = match stopped {
            Stopped::Dispatcher(joined) => joined,
            Stopped::Server(served) => {
                if let Err(e) = server_result(served) {
                    handle.abort();
                    return Err(e);
                }
                // ctrl-c reached the server first; the dispatcher saw it too
                let _ = handle.await;
                return Ok(());
            }
        };

        match joined {
            Ok(()) => {
                log::info!("Dispatcher shutdown gracefully");
                break;
            }
            Err(join_err) if join_err.is_panic() && restarts < MAX_DISPATCHER_RESTARTS => {
                restarts += 1;
                log::error!(
                    "Dispatcher panicked: {} (restart {}/{})",
                    join_err,
                    restarts,
                    MAX_DISPATCHER_RESTARTS
                );
                tokio::time::sleep(std::time::Duration::from_secs(u64::from(restarts))).await;
            }
            Err(join_err) => {
                server.abort();
                return Err(anyhow::anyhow!("Dispatcher stopped: {}", join_err));
            }
        }
    }

    server_result(server.await)
}

/// Webhook mode: registers `url` with Telegram and serves the update route
/// from the same router as the rest of the HTTP surface.
pub async fn run_webhook(bot: Bot, deps: HandlerDeps, web_app: Router, port: u16, url: Url) -> anyhow::Result<()> {
    // Bound before registering, so Telegram never points at a dead port
    let listener = bind(port).await?;

    log::info!("Starting bot in webhook mode at {}", url);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let options = webhooks::Options::new(addr, url).drop_pending_updates();
    let (updates, stop_flag, telegram_router) = webhooks::axum_to_router(bot.clone(), options).await?;

    match bot.get_webhook_info().await {
        Ok(info) => match info.url {
            Some(registered) => log::info!("✅ Webhook registered: {}", registered),
            None => log::warn!("⚠️  getWebhookInfo reports an empty url; updates will not arrive"),
        },
        Err(e) => log::warn!("Could not read webhook info: {}", e),
    }

    let app = web_app.merge(telegram_router);
    let mut server = spawn_web_server(listener, app, stop_flag);

    let mut dispatcher = Dispatcher::builder(bot, schema(deps)).enable_ctrlc_handler().build();
    let dispatch = dispatcher.dispatch_with_listener(
        updates,
        LoggingErrorHandler::with_custom_text("An error from the webhook listener"),
    );

    let stopped = tokio::select! {
        () = dispatch => Stopped::Dispatcher(Ok(())),
        served = &mut server => Stopped::Server(served),
    };
    match stopped {
        Stopped::Dispatcher(_) => server_result(server.await),
        Stopped::Server(served) => server_result(served),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_taken_port_fails_before_anything_starts() {
        let taken = TcpListener::bind("0.0.0.0:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = bind(port).await.unwrap_err();
        assert!(err.to_string().contains(&port.to_string()));
    }

    #[tokio::test]
    async fn test_server_result_distinguishes_failure() {
        let listener = bind(0).await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = spawn_web_server(listener, Router::new(), async move {
            let _ = rx.await;
        });

        tx.send(()).unwrap();
        assert!(server_result(server.await).is_ok());

        let failed: Result<std::io::Result<()>, JoinError> =
            Ok(Err(std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use")));
        assert!(server_result(failed).is_err());
    }
}
