use std::sync::Arc;

use crate::cli::{self, AsciiCalendarRenderer, ConsoleGateway};
use crate::config::AppConfig;
use crate::events::queue::EventBus;
use crate::events::worker;
use crate::gateway::MessageGateway;
use crate::models::user::UserRef;
use crate::service::dialog::DialogEngine;
use crate::store::CalendarStore;
use crate::tasks::{cleanup_loop, reminder_loop, task_runner::TaskRunner};

/// Wires the console front end to the dialog engine and background loops,
/// then hands the terminal to the interactive session.
pub async fn run_console(config: AppConfig, store: CalendarStore) {
    let gateway = Arc::new(ConsoleGateway::new());
    let renderer = Arc::new(AsciiCalendarRenderer);
    let engine = Arc::new(DialogEngine::new(
        store.clone(),
        gateway.clone(),
        renderer,
    ));
    let (bus, rx) = EventBus::new(32);

    let mut task_runner = TaskRunner::new();
    task_runner.add_task("dialog-worker", {
        let engine = engine.clone();
        move || {
            tokio::spawn(async move {
                worker::run_event_worker(rx, engine).await;
            });
        }
    });
    task_runner.add_task("reminder-loop", {
        let store = store.clone();
        let sender: Arc<dyn MessageGateway> = gateway.clone();
        move || {
            tokio::spawn(async move {
                reminder_loop::run_reminder_loop(store, sender).await;
            });
        }
    });
    task_runner.add_task("cleanup-loop", {
        let store = store.clone();
        move || {
            tokio::spawn(async move {
                cleanup_loop::run_cleanup_loop(store).await;
            });
        }
    });
    task_runner.start_all();

    let user = UserRef::new(
        config.console_user_id(),
        config.console_username().as_deref(),
        &config.console_full_name(),
    );
    cli::run_console_session(bus, gateway, user).await;
}
