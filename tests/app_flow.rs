use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use routevisor::{
    AppBuilder, AppDb, AppHandle, ControllerError, ControllerFn, ControllerRef, Event, EventKind,
    HandlerContext, ManagerConfig, RouteParams, RuntimeError, UiCommand,
};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio::time::timeout;

/// Handler that appends every command it receives to `journal.<topic>` in the db.
async fn journal(mut ctx: HandlerContext) -> Result<(), ControllerError> {
    let key = format!("journal.{}", ctx.topic);
    while let Some(cmd) = ctx.inbound.recv().await {
        let key = key.clone();
        ctx.outbound.update(move |db| {
            db.update(&key, |log| {
                let mut items = match log {
                    Value::Array(items) => items,
                    _ => Vec::new(),
                };
                items.push(json!({ "name": cmd.name, "args": cmd.args }));
                Value::Array(items)
            })
        })?;
    }
    Ok(())
}

fn journal_of(db: &AppDb, topic: &str) -> Vec<(String, Value)> {
    db.get(&format!("journal.{topic}"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|e| {
                    (
                        e["name"].as_str().unwrap_or_default().to_string(),
                        e["args"].clone(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

fn news() -> ControllerRef {
    ControllerFn::new(|route: &RouteParams| {
        Ok(route
            .get("page")
            .map(|page| json!({ "page": page, "per_page": 10 })))
    })
    .on_start(|config, db| Ok(db.with("news", json!({ "page": config["page"] }))))
    .on_stop(|_config, mut db| {
        db.remove("news");
        Ok(db)
    })
    .on_handle(journal)
    .arc()
}

fn users() -> ControllerRef {
    ControllerFn::always(json!(true)).on_handle(journal).arc()
}

fn category() -> ControllerRef {
    ControllerFn::new(|route: &RouteParams| {
        Ok(route.get("category_id").map(|id| json!({ "id": id })))
    })
    .on_start(|config, db| Ok(db.with("category", config.clone())))
    .on_stop(|_config, mut db| {
        db.remove("category");
        Ok(db)
    })
    .arc()
}

fn comments() -> ControllerRef {
    ControllerFn::new(|route: &RouteParams| {
        Ok(route.get("news_id").map(|id| json!({ "news_id": id })))
    })
    .on_start(|_config, db| Ok(db.with("comments", json!([]))))
    .on_stop(|_config, mut db| {
        db.remove("comments");
        Ok(db)
    })
    .arc()
}

fn image_gallery() -> ControllerRef {
    ControllerFn::new(|_route: &RouteParams| Ok(None)).arc()
}

fn news_app() -> AppBuilder {
    AppBuilder::default()
        .controller("news", news())
        .controller("users", users())
        .controller("category", category())
        .controller("comments", comments())
        .controller("image_gallery", image_gallery())
}

async fn wait_db(app: &AppHandle, pred: impl Fn(&AppDb) -> bool) -> Arc<AppDb> {
    let mut rx = app.watch_db();
    let db = timeout(Duration::from_secs(2), rx.wait_for(|db| pred(db)))
        .await
        .expect("timed out waiting for db")
        .expect("manager gone");
    Arc::clone(&db)
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

async fn next_event(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
    timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Ok(ev) if ev.kind == kind => return ev,
                Ok(_) => {}
                Err(e) => panic!("event stream ended: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

async fn running_topics(app: &AppHandle) -> Vec<String> {
    app.running()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.topic)
        .collect()
}

#[tokio::test]
async fn navigation_reconciles_the_running_set() {
    let app = news_app()
        .initial_route(RouteParams::new().with("page", 1).with("news_id", 1))
        .start()
        .unwrap();
    assert_eq!(running_topics(&app).await, vec!["comments", "news", "users"]);

    let mut events = app.events();
    app.navigate(RouteParams::new().with("page", 2).with("category_id", 1))
        .unwrap();

    let running = app.running().await.unwrap();
    let topics: Vec<&str> = running.iter().map(|r| r.topic.as_str()).collect();
    assert_eq!(topics, vec!["category", "news", "users"]);

    assert_eq!(running[0].config, json!({ "id": 1 }));
    assert_eq!(running[0].runs, 1);
    assert_eq!(running[1].config, json!({ "page": 2, "per_page": 10 }));
    assert_eq!(running[1].runs, 2);
    assert_eq!(running[2].runs, 1);
    assert!(running.iter().all(|r| r.handler_alive || r.topic == "category"));

    let events = drain(&mut events);
    let received: Vec<&Event> = events
        .iter()
        .filter(|e| e.kind == EventKind::RouteReceived)
        .collect();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].reason, None);

    let finished: Vec<&Event> = events
        .iter()
        .filter(|e| e.kind == EventKind::ReconcileFinished)
        .collect();
    assert_eq!(finished.len(), 1);
    assert_eq!(
        finished[0].reason.as_deref(),
        Some("start=1 stop=1 restart=1 route_changed=1")
    );

    let db = app.snapshot();
    assert!(db.get("comments").is_none());
    assert_eq!(db.get("category"), Some(&json!({ "id": 1 })));
    assert_eq!(db.get_in(&["news", "page"]), Some(&json!(2)));

    let db = wait_db(&app, |db| !journal_of(db, "users").is_empty()).await;
    assert_eq!(
        journal_of(&db, "users"),
        vec![("route-changed".to_string(), json!(true))]
    );

    app.stop().await.unwrap();
}

#[tokio::test]
async fn commands_reach_the_handler_in_order() {
    let app = AppBuilder::default()
        .controller(
            "log",
            ControllerFn::always(json!({})).on_handle(journal).arc(),
        )
        .start()
        .unwrap();

    for i in 0..5 {
        app.send_command("log", "append", json!(i)).unwrap();
    }

    let db = wait_db(&app, |db| journal_of(db, "log").len() == 5).await;
    let args: Vec<Value> = journal_of(&db, "log").into_iter().map(|(_, a)| a).collect();
    assert_eq!(
        args,
        vec![json!(0), json!(1), json!(2), json!(3), json!(4)]
    );

    app.stop().await.unwrap();
}

#[tokio::test]
async fn command_for_a_stopped_topic_is_dropped_silently() {
    let app = news_app()
        .initial_route(RouteParams::new().with("page", 1))
        .start()
        .unwrap();
    let mut events = app.events();

    // news stops here; the command below arrives after the stop.
    app.navigate(RouteParams::new()).unwrap();
    app.send_command("image_gallery", "open", json!(1)).unwrap();
    app.dispatch(UiCommand::new("news", "load", json!(null)))
        .unwrap();
    // Inspect is queued behind both commands.
    app.running().await.unwrap();

    let dropped: Vec<Event> = drain(&mut events)
        .into_iter()
        .filter(|e| e.kind == EventKind::CommandDropped)
        .collect();
    assert_eq!(dropped.len(), 2);
    assert_eq!(dropped[0].topic.as_deref(), Some("image_gallery"));
    assert_eq!(dropped[0].command.as_deref(), Some("open"));
    assert_eq!(dropped[0].reason.as_deref(), Some("not_running"));
    assert_eq!(dropped[1].topic.as_deref(), Some("news"));

    assert!(app.is_running());
    app.stop().await.unwrap();
}

#[tokio::test]
async fn failing_params_leave_only_that_topic_untouched() {
    let flaky = ControllerFn::new(|route: &RouteParams| match route.get("boom") {
        Some(_) => Err(ControllerError::invalid_params("boom")),
        None => Ok(Some(json!(true))),
    })
    .on_handle(journal)
    .arc();
    let panicky = ControllerFn::new(|route: &RouteParams| {
        if route.get("boom").is_some() {
            panic!("params exploded");
        }
        Ok(Some(json!(true)))
    })
    .arc();

    let app = AppBuilder::default()
        .controller("flaky", flaky)
        .controller("panicky", panicky)
        .controller("users", users())
        .start()
        .unwrap();
    assert_eq!(running_topics(&app).await, vec!["flaky", "panicky", "users"]);

    let mut events = app.events();
    app.navigate(RouteParams::new().with("boom", true)).unwrap();
    let running = app.running().await.unwrap();

    assert_eq!(running.len(), 3);
    assert!(running.iter().all(|r| r.runs == 1 && r.config == json!(true)));

    let events = drain(&mut events);
    let failed: Vec<&str> = events
        .iter()
        .filter(|e| e.kind == EventKind::ParamsFailed)
        .filter_map(|e| e.topic.as_deref())
        .collect();
    assert_eq!(failed, vec!["flaky", "panicky"]);
    let panicked = events
        .iter()
        .find(|e| e.kind == EventKind::ParamsFailed && e.topic.as_deref() == Some("panicky"))
        .and_then(|e| e.reason.as_deref())
        .unwrap_or_default();
    assert!(panicked.contains("params exploded"));

    let forwarded: Vec<&str> = events
        .iter()
        .filter(|e| e.kind == EventKind::RouteForwarded)
        .filter_map(|e| e.topic.as_deref())
        .collect();
    assert_eq!(forwarded, vec!["users"]);

    app.stop().await.unwrap();
}

#[tokio::test]
async fn handlers_send_commands_and_update_state() {
    let pinger = ControllerFn::always(json!(true))
        .on_handle(|mut ctx: HandlerContext| async move {
            while let Some(cmd) = ctx.inbound.recv().await {
                if cmd.name == "ping" {
                    ctx.outbound.send("log", "pong", cmd.args)?;
                    ctx.outbound.update(|db| {
                        db.insert("pinged", true);
                    })?;
                }
            }
            Ok::<(), ControllerError>(())
        })
        .arc();

    let app = AppBuilder::default()
        .controller("pinger", pinger)
        .controller(
            "log",
            ControllerFn::always(json!(true)).on_handle(journal).arc(),
        )
        .start()
        .unwrap();

    app.send_command("pinger", "ping", json!(7)).unwrap();

    let db = wait_db(&app, |db| !journal_of(db, "log").is_empty()).await;
    assert_eq!(journal_of(&db, "log"), vec![("pong".to_string(), json!(7))]);
    assert_eq!(db.get("pinged"), Some(&json!(true)));

    app.stop().await.unwrap();
}

#[tokio::test]
async fn route_and_command_sources_drive_the_manager() {
    let (routes_tx, routes) = futures::channel::mpsc::unbounded::<RouteParams>();
    let (commands_tx, commands) = futures::channel::mpsc::unbounded::<UiCommand>();

    let app = news_app()
        .route_source(routes)
        .command_source(commands)
        .start()
        .unwrap();
    assert_eq!(running_topics(&app).await, vec!["users"]);

    routes_tx
        .unbounded_send(RouteParams::new().with("page", 2))
        .unwrap();
    wait_db(&app, |db| db.get_in(&["news", "page"]) == Some(&json!(2))).await;

    commands_tx
        .unbounded_send(UiCommand::new("news", "load-more", json!({ "page": 3 })))
        .unwrap();
    let db = wait_db(&app, |db| !journal_of(db, "news").is_empty()).await;
    assert_eq!(
        journal_of(&db, "news"),
        vec![("load-more".to_string(), json!({ "page": 3 }))]
    );

    // Sources ending does not stop the application.
    drop(routes_tx);
    drop(commands_tx);
    app.navigate(RouteParams::new()).unwrap();
    assert_eq!(running_topics(&app).await, vec!["users"]);

    app.stop().await.unwrap();
}

#[tokio::test]
async fn stop_tears_everything_down_and_returns_the_final_db() {
    let app = news_app()
        .initial_db(AppDb::new().with("session", "abc"))
        .initial_route(RouteParams::new().with("page", 1))
        .start()
        .unwrap();
    app.update(|db| {
        db.insert("host", true);
    })
    .unwrap();
    assert_eq!(running_topics(&app).await, vec!["news", "users"]);
    assert_eq!(app.snapshot().get("host"), Some(&json!(true)));

    let mut events = app.events();
    let db = app.stop().await.unwrap();

    assert_eq!(db.get("session"), Some(&json!("abc")));
    assert_eq!(db.get("host"), Some(&json!(true)));
    assert!(db.get("news").is_none());

    let kinds: Vec<EventKind> = drain(&mut events).into_iter().map(|e| e.kind).collect();
    assert_eq!(kinds.first(), Some(&EventKind::ShutdownRequested));
    assert_eq!(
        kinds
            .iter()
            .filter(|k| **k == EventKind::ControllerStopped)
            .count(),
        2
    );
    assert!(kinds.contains(&EventKind::ManagerStopped));
}

#[tokio::test]
async fn stuck_handler_is_aborted_and_reported_on_stop() {
    let stuck = ControllerFn::always(json!(true))
        .on_handle(|_ctx: HandlerContext| {
            futures::future::pending::<Result<(), ControllerError>>()
        })
        .arc();

    let cfg = ManagerConfig {
        stop_grace: Duration::from_millis(50),
        ..ManagerConfig::default()
    };
    let app = AppBuilder::new(cfg)
        .controller("stuck", stuck)
        .controller("users", users())
        .start()
        .unwrap();
    assert_eq!(running_topics(&app).await, vec!["stuck", "users"]);

    match app.stop().await.unwrap_err() {
        RuntimeError::StopGraceExceeded { stuck, grace } => {
            assert_eq!(stuck, vec!["stuck".to_string()]);
            assert_eq!(grace, Duration::from_millis(50));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn restart_never_overlaps_old_and_new_handlers() {
    let live = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let news = {
        let (live, peak) = (live.clone(), peak.clone());
        ControllerFn::new(|route: &RouteParams| Ok(route.get("page").cloned()))
            .on_handle(move |mut ctx: HandlerContext| {
                let (live, peak) = (live.clone(), peak.clone());
                async move {
                    let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    while ctx.inbound.recv().await.is_some() {}
                    // Give an overlapping successor the chance to show up.
                    tokio::task::yield_now().await;
                    live.fetch_sub(1, Ordering::SeqCst);
                    Ok::<(), ControllerError>(())
                }
            })
            .arc()
    };

    let app = AppBuilder::default()
        .controller("news", news)
        .initial_route(RouteParams::new().with("page", 1))
        .start()
        .unwrap();

    for page in 2..=4 {
        app.navigate(RouteParams::new().with("page", page)).unwrap();
    }
    let running = app.running().await.unwrap();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].runs, 4);
    assert_eq!(running[0].config, json!(4));

    app.stop().await.unwrap();
    assert_eq!(live.load(Ordering::SeqCst), 0);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn panicking_update_is_discarded_and_the_app_keeps_running() {
    let bad = ControllerFn::always(json!(true))
        .on_handle(|mut ctx: HandlerContext| async move {
            while let Some(cmd) = ctx.inbound.recv().await {
                if cmd.name == "go" {
                    ctx.outbound.update(|db| {
                        db.insert("half", true);
                        panic!("bad update");
                    })?;
                }
            }
            Ok::<(), ControllerError>(())
        })
        .arc();

    let app = AppBuilder::default()
        .controller("bad", bad)
        .controller(
            "good",
            ControllerFn::always(json!(true)).on_handle(journal).arc(),
        )
        .start()
        .unwrap();
    let mut events = app.events();

    app.send_command("bad", "go", json!(null)).unwrap();
    let panicked = next_event(&mut events, EventKind::UpdatePanicked).await;
    assert_eq!(panicked.topic.as_deref(), Some("bad"));
    assert_eq!(panicked.reason.as_deref(), Some("bad update"));
    assert!(panicked.is_fault());

    app.send_command("good", "after", json!(1)).unwrap();
    let db = wait_db(&app, |db| !journal_of(db, "good").is_empty()).await;
    assert_eq!(
        journal_of(&db, "good"),
        vec![("after".to_string(), json!(1))]
    );
    assert!(db.get("half").is_none());
    assert_eq!(running_topics(&app).await, vec!["bad", "good"]);

    let mut events = app.events();
    let db = app.stop().await.unwrap();
    assert!(db.get("half").is_none());
    let stopped: Vec<String> = drain(&mut events)
        .into_iter()
        .filter(|e| e.kind == EventKind::ControllerStopped)
        .filter_map(|e| e.topic.map(|t| t.to_string()))
        .collect();
    assert_eq!(stopped, vec!["bad", "good"]);
}

#[tokio::test]
async fn faulting_handlers_leave_other_topics_and_stop_untouched() {
    let failing = ControllerFn::always(json!(true))
        .on_handle(|mut ctx: HandlerContext| async move {
            ctx.inbound.recv().await;
            Err::<(), _>(ControllerError::failed("lost connection"))
        })
        .arc();
    let panicking = ControllerFn::always(json!(true))
        .on_handle(|mut ctx: HandlerContext| async move {
            if ctx.inbound.recv().await.is_some() {
                panic!("handler exploded");
            }
            Ok::<(), ControllerError>(())
        })
        .arc();

    let app = AppBuilder::default()
        .controller("failing", failing)
        .controller("panicking", panicking)
        .controller(
            "good",
            ControllerFn::always(json!(true)).on_handle(journal).arc(),
        )
        .start()
        .unwrap();
    let mut failed = app.events();
    let mut panicked = app.events();

    app.send_command("failing", "go", json!(null)).unwrap();
    app.send_command("panicking", "go", json!(null)).unwrap();
    let ev = next_event(&mut failed, EventKind::HandlerFailed).await;
    assert_eq!(ev.topic.as_deref(), Some("failing"));
    let ev = next_event(&mut panicked, EventKind::HandlerPanicked).await;
    assert_eq!(ev.topic.as_deref(), Some("panicking"));
    assert_eq!(ev.reason.as_deref(), Some("handler exploded"));

    for i in 0..3 {
        app.send_command("good", "tick", json!(i)).unwrap();
    }

    let db = wait_db(&app, |db| journal_of(db, "good").len() == 3).await;
    let args: Vec<Value> = journal_of(&db, "good")
        .into_iter()
        .map(|(_, a)| a)
        .collect();
    assert_eq!(args, vec![json!(0), json!(1), json!(2)]);

    // Dead handlers keep their entries until their topics are stopped.
    let running = app.running().await.unwrap();
    let alive: Vec<(&str, bool)> = running
        .iter()
        .map(|r| (r.topic.as_str(), r.handler_alive))
        .collect();
    assert_eq!(
        alive,
        vec![("failing", false), ("good", true), ("panicking", false)]
    );

    app.send_command("good", "tick", json!(3)).unwrap();
    wait_db(&app, |db| journal_of(db, "good").len() == 4).await;

    let db = app.stop().await.unwrap();
    assert_eq!(journal_of(&db, "good").len(), 4);
}
