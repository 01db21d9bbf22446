//! # Example: news_app
//!
//! A small news reader wired through routevisor.
//!
//! Shows how to:
//! - Implement the [`Controller`] trait on a type.
//! - Combine it with closure-backed [`ControllerFn`] controllers.
//! - Drive the app with navigation and UI commands, and read db snapshots.
//! - Attach the built-in [`LogWriter`] and a `tracing` subscriber.
//!
//! ## Flow
//! ```text
//! navigate(page=1) ──► news Start, users Start
//! load-more        ──► news handler ──► Outbound::update(items += …)
//! navigate(page=2) ──► news Restart, users RouteChanged
//! navigate(news_id) ─► news Stop, comments Start
//! stop()           ──► comments Stop, users Stop ──► final db
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=routevisor=debug cargo run --example news_app
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use routevisor::{
    AppBuilder, AppDb, ConfigValue, Controller, ControllerError, ControllerFn, HandlerContext,
    LogWriter, ManagerConfig, RouteParams,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Paged news list, running whenever the route carries a `page`.
struct NewsController {
    per_page: u64,
}

impl NewsController {
    fn fake_items(page: u64, per_page: u64) -> Vec<String> {
        let first = (page - 1) * per_page;
        (first..first + per_page)
            .map(|i| format!("headline #{i}"))
            .collect()
    }
}

#[async_trait]
impl Controller for NewsController {
    fn params(&self, route: &RouteParams) -> Result<Option<ConfigValue>, ControllerError> {
        let Some(page) = route.get("page") else {
            return Ok(None);
        };
        let page = page
            .as_u64()
            .filter(|p| *p > 0)
            .ok_or_else(|| ControllerError::invalid_params(format!("bad page {page}")))?;
        Ok(Some(json!({ "page": page, "per_page": self.per_page })))
    }

    fn start(&self, config: &ConfigValue, db: AppDb) -> Result<AppDb, ControllerError> {
        Ok(db.with(
            "news",
            json!({ "page": config["page"], "items": [], "loading": true }),
        ))
    }

    fn stop(&self, _config: &ConfigValue, mut db: AppDb) -> Result<AppDb, ControllerError> {
        db.remove("news");
        Ok(db)
    }

    async fn handle(&self, mut ctx: HandlerContext) -> Result<(), ControllerError> {
        let page = ctx.config["page"].as_u64().unwrap_or(1);
        let per_page = self.per_page;
        let mut loaded = page;

        // Simulated fetch; abandoned if the controller is stopped meanwhile.
        tokio::select! {
            _ = ctx.inbound.closed() => return Ok(()),
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
        }
        let items = Self::fake_items(page, per_page);
        ctx.outbound.update(move |db| {
            db.insert("news", json!({ "page": page, "items": items, "loading": false }));
        })?;

        while let Some(cmd) = ctx.inbound.recv().await {
            match cmd.name.as_str() {
                "load-more" => {
                    loaded += 1;
                    let more = Self::fake_items(loaded, per_page);
                    ctx.outbound.update(move |db| {
                        db.update("news", |mut news| {
                            if let Some(items) = news["items"].as_array_mut() {
                                items.extend(more.into_iter().map(Into::into));
                            }
                            news
                        });
                    })?;
                }
                "route-changed" => {
                    tracing::info!(config = %cmd.args, "news: same page, nothing to do")
                }
                other => tracing::warn!(command = other, "news: unknown command"),
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("routevisor=info")),
        )
        .init();

    let users = ControllerFn::always(json!(true))
        .on_start(|_config, db| Ok(db.with("users", json!(["ada", "linus"]))))
        .on_stop(|_config, mut db| {
            db.remove("users");
            Ok(db)
        })
        .arc();

    let comments = ControllerFn::new(|route: &RouteParams| {
        Ok(route.get("news_id").map(|id| json!({ "news_id": id })))
    })
    .on_start(|config, db| {
        Ok(db.with("comments", json!({ "news_id": config["news_id"], "items": [] })))
    })
    .on_stop(|_config, mut db| {
        db.remove("comments");
        Ok(db)
    })
    .arc();

    let app = AppBuilder::new(ManagerConfig::default())
        .subscriber(Arc::new(LogWriter::new()))
        .controller("news", Arc::new(NewsController { per_page: 3 }))
        .controller("users", users)
        .controller("comments", comments)
        .initial_route(RouteParams::new().with("page", 1))
        .start()?;

    let mut db = app.watch_db();
    db.wait_for(|db| db.get_in(&["news", "loading"]) == Some(&json!(false)))
        .await?;
    println!(
        "page 1: {}",
        app.snapshot().get("news").cloned().unwrap_or_default()
    );

    app.send_command("news", "load-more", json!(null))?;
    db.wait_for(|db| {
        db.get_in(&["news", "items"])
            .and_then(|items| items.as_array())
            .is_some_and(|items| items.len() == 6)
    })
    .await?;
    println!(
        "after load-more: {}",
        app.snapshot().get("news").cloned().unwrap_or_default()
    );

    app.navigate(RouteParams::new().with("page", 2))?;
    app.navigate(RouteParams::new().with("news_id", 42))?;
    for info in app.running().await? {
        println!(
            "running: {} config={} runs={}",
            info.topic, info.config, info.runs
        );
    }

    let last = app.stop().await?;
    println!("final db: {}", last.into_value());
    Ok(())
}
