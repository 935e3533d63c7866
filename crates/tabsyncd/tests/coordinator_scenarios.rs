//! End-to-end scenarios for the event coordinator.
//!
//! These drive `Coordinator` handlers directly against the in-memory
//! browser, feeding every event the browser emits back into the coordinator
//! in order, the way a single-threaded browser event loop would.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::sync::Arc;

use tabsync_core::{TabId, WindowId};
use tabsync_protocol::{Metadata, Notification, Request};
use tabsyncd::browser::{
    BrowserCall, BrowserEvent, MemoryBrowser, TabController, WindowState, WindowUpdate,
};
use tabsyncd::config::Config;
use tabsyncd::context::Context;
use tabsyncd::coordinator::Coordinator;
use tabsyncd::registry::Entity;
use tokio::sync::mpsc::UnboundedReceiver;

// ============================================================================
// Test Helpers
// ============================================================================

const CUSTOMER_URL: &str = "https://crm.example/CustomerScreenEntry.aspx?CustomerId=42";

/// Upper bound on events handled by one pump, guards against feedback loops.
const MAX_PUMPED_EVENTS: usize = 200;

fn customer_url(customer_id: &str) -> String {
    format!("https://crm.example/CustomerScreenEntry.aspx?CustomerId={customer_id}")
}

fn action_url(customer_id: &str, action_id: &str) -> String {
    format!(
        "https://crm.example/CustomerService/ActionScreen.aspx?CustomerId={customer_id}&ActionId={action_id}"
    )
}

fn test_config() -> Config {
    Config {
        minimize_settle_ms: 0,
        ..Config::default()
    }
}

/// Coordinator over a browser that forwards its events.
fn setup() -> (
    Arc<MemoryBrowser>,
    Coordinator,
    UnboundedReceiver<BrowserEvent>,
) {
    let (browser, events) = MemoryBrowser::with_events();
    let browser = Arc::new(browser);
    let coordinator = Coordinator::new(Context::from_browser(browser.clone(), test_config()));
    (browser, coordinator, events)
}

/// Coordinator over a browser that emits nothing.
fn setup_quiet() -> (Arc<MemoryBrowser>, Coordinator) {
    let browser = Arc::new(MemoryBrowser::new());
    let coordinator = Coordinator::new(Context::from_browser(browser.clone(), test_config()));
    (browser, coordinator)
}

/// Handles pending browser events in order until none are left.
async fn pump(coordinator: &Coordinator, events: &mut UnboundedReceiver<BrowserEvent>) -> usize {
    let mut handled = 0;
    for _ in 0..MAX_PUMPED_EVENTS {
        let Ok(event) = events.try_recv() else {
            break;
        };
        coordinator.dispatch_event(event).await;
        handled += 1;
    }
    handled
}

async fn register_customer(
    coordinator: &Coordinator,
    browser: &MemoryBrowser,
    window: WindowId,
    tab: u64,
    id: &str,
) {
    let url = customer_url(id);
    browser.insert_tab(TabId(tab), window, &url, true).unwrap();
    coordinator
        .handle_event(BrowserEvent::TabUpdated {
            tab: TabId(tab),
            url: Some(url),
        })
        .await
        .unwrap();
}

async fn open_action(coordinator: &Coordinator, customer_id: &str, action_id: &str) {
    coordinator
        .handle_request(Request::open(
            action_url(customer_id, action_id),
            Some(&format!("{customer_id}:{action_id}")),
        ))
        .await
        .unwrap();
}

fn closed_notifications(browser: &MemoryBrowser) -> Vec<Notification> {
    browser
        .notifications()
        .into_iter()
        .filter_map(|(_, notification)| match notification {
            closed @ Notification::Closed { .. } => Some(closed),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_customer_then_action_in_same_tab() {
    let (browser, coordinator, mut events) = setup();
    let window = browser.insert_window();
    assert_eq!(window, WindowId(1));
    browser.insert_tab(TabId(10), window, "about:blank", true).unwrap();

    // Customer page
    browser.navigate(TabId(10), CUSTOMER_URL).unwrap();
    pump(&coordinator, &mut events).await;

    let customer = {
        let registry = coordinator.context().registry();
        let by_id = registry.customer("42").expect("customer by id");
        let by_tab = registry.customer(TabId(10)).expect("customer by tab");
        assert!(Arc::ptr_eq(&by_id, &by_tab));
        by_id
    };
    assert_eq!(customer.id(), "42");
    assert_eq!(customer.tab(), TabId(10));

    // Same tab navigates to an action page of that customer
    browser.navigate(TabId(10), &action_url("42", "7")).unwrap();
    pump(&coordinator, &mut events).await;

    {
        let registry = coordinator.context().registry();
        let action = registry.action("42:7").expect("action by id");
        assert!(Arc::ptr_eq(&action, &registry.action(TabId(10)).unwrap()));
        assert_eq!(action.id(), "7");
        assert_eq!(action.window(), WindowId(1));
        assert_eq!(action.tab(), TabId(10));
        assert!(action.belongs_to(&customer));
        assert!(Arc::ptr_eq(&registry.customer("42").unwrap(), &customer));
    }

    // Closing the tab deregisters the action and notifies with its id
    browser.close_tab(TabId(10)).unwrap();
    pump(&coordinator, &mut events).await;

    assert!(!coordinator.context().registry().has("42:7"));
    assert_eq!(customer.action_count(), 0);
    assert_eq!(
        closed_notifications(&browser),
        vec![Notification::closed("42:7", None)]
    );
    assert!(coordinator.context().registry().is_empty());
}

#[tokio::test]
async fn test_bijection_holds_for_every_entity() {
    let (browser, coordinator, mut events) = setup();
    let window = browser.insert_window();
    register_customer(&coordinator, &browser, window, 10, "42").await;
    register_customer(&coordinator, &browser, window, 11, "43").await;
    open_action(&coordinator, "42", "1").await;
    open_action(&coordinator, "43", "2").await;
    pump(&coordinator, &mut events).await;

    let registry = coordinator.context().registry();
    for customer in registry.customers() {
        let by_id = registry.get(customer.id()).unwrap();
        let by_tab = registry.get(customer.tab()).unwrap();
        assert!(by_id.same(&by_tab));
        assert!(by_id.same(&Entity::Customer(customer.clone())));
    }
    for action in registry.actions() {
        let by_id = registry.get(action.composite_id()).unwrap();
        let by_tab = registry.get(action.tab()).unwrap();
        assert!(by_id.same(&by_tab));
        assert!(by_id.same(&Entity::Action(action.clone())));
    }
    assert_eq!(registry.len(), 4);
}

// ============================================================================
// Cascade Closure
// ============================================================================

#[tokio::test]
async fn test_close_request_removes_actions_then_customer() {
    let (browser, coordinator, mut events) = setup();
    let window = browser.insert_window();
    register_customer(&coordinator, &browser, window, 10, "42").await;
    open_action(&coordinator, "42", "1").await;
    pump(&coordinator, &mut events).await;
    open_action(&coordinator, "42", "2").await;
    pump(&coordinator, &mut events).await;

    let action_tabs: Vec<TabId> = {
        let customer = coordinator.context().registry().customer("42").unwrap();
        customer.actions().iter().map(|a| a.tab()).collect()
    };
    assert_eq!(action_tabs.len(), 2);
    browser.take_calls();

    let mut rest = Metadata::new();
    rest.insert("reason".to_string(), serde_json::json!("done"));
    coordinator
        .handle_request(Request::close("42", rest.clone()))
        .await
        .unwrap();

    // N + 1 tabs in one request, customer last
    let mut expected = action_tabs.clone();
    expected.push(TabId(10));
    assert_eq!(browser.calls(), vec![BrowserCall::RemoveTabs(expected)]);

    pump(&coordinator, &mut events).await;

    let registry = coordinator.context().registry();
    assert!(registry.is_empty());
    assert!(!registry.has("42"));
    assert!(!registry.has("42:1"));
    assert!(!registry.has("42:2"));
    drop(registry);

    assert_eq!(
        closed_notifications(&browser),
        vec![
            Notification::closed("42:1", Some(rest.clone())),
            Notification::closed("42:2", Some(rest)),
        ]
    );
    assert_eq!(coordinator.context().action_window().id(), None);
}

#[tokio::test]
async fn test_user_closing_customer_tab_cascades() {
    let (browser, coordinator, mut events) = setup();
    let window = browser.insert_window();
    register_customer(&coordinator, &browser, window, 10, "42").await;
    open_action(&coordinator, "42", "1").await;
    open_action(&coordinator, "42", "2").await;
    pump(&coordinator, &mut events).await;

    let action_tabs: Vec<TabId> = {
        let customer = coordinator.context().registry().customer("42").unwrap();
        customer.actions().iter().map(|a| a.tab()).collect()
    };
    browser.take_calls();

    browser.close_tab(TabId(10)).unwrap();
    pump(&coordinator, &mut events).await;

    let removals: Vec<BrowserCall> = browser
        .calls()
        .into_iter()
        .filter(|call| matches!(call, BrowserCall::RemoveTabs(_)))
        .collect();
    assert_eq!(
        removals,
        action_tabs
            .iter()
            .map(|tab| BrowserCall::RemoveTabs(vec![*tab]))
            .collect::<Vec<_>>()
    );
    assert!(coordinator.context().registry().is_empty());
    assert_eq!(browser.tab_count(), 0);
}

#[tokio::test]
async fn test_close_single_action_keeps_customer() {
    let (browser, coordinator, mut events) = setup();
    let window = browser.insert_window();
    register_customer(&coordinator, &browser, window, 10, "42").await;
    open_action(&coordinator, "42", "1").await;
    open_action(&coordinator, "42", "2").await;
    pump(&coordinator, &mut events).await;

    let mut rest = Metadata::new();
    rest.insert("outcome".to_string(), serde_json::json!(3));
    coordinator
        .handle_request(Request::close("42:1", rest.clone()))
        .await
        .unwrap();
    pump(&coordinator, &mut events).await;

    let customer = coordinator.context().registry().customer("42").unwrap();
    assert_eq!(customer.action_count(), 1);
    assert!(customer.find_action("2").is_some());
    assert!(!coordinator.context().registry().has("42:1"));

    let notifications = browser.notifications();
    assert!(notifications.contains(&(TabId(10), Notification::closed("42:1", Some(rest)))));
}

// ============================================================================
// Focus
// ============================================================================

#[tokio::test]
async fn test_focus_delegation() {
    let (browser, coordinator) = setup_quiet();
    let main = browser.insert_window();
    register_customer(&coordinator, &browser, main, 10, "1").await;
    register_customer(&coordinator, &browser, main, 11, "2").await;
    register_customer(&coordinator, &browser, main, 12, "3").await;
    open_action(&coordinator, "2", "9").await;
    open_action(&coordinator, "3", "5").await;

    let ctx = coordinator.context();
    let (c1, c2) = {
        let registry = ctx.registry();
        (registry.customer("1").unwrap(), registry.customer("2").unwrap())
    };
    let c2_action = c2.find_action("9").unwrap();
    let action_window = ctx.action_window().id().unwrap();

    // No actions of its own: the action window is minimized
    browser.take_calls();
    c1.focus(ctx).await.unwrap();
    assert_eq!(
        browser.take_calls(),
        vec![BrowserCall::UpdateWindow {
            window: action_window,
            update: WindowUpdate::state(WindowState::Minimized),
        }]
    );
    assert_eq!(browser.window(action_window).unwrap().state, WindowState::Minimized);

    // Window shows customer 3's action: restore it and switch to customer 2's
    c2.focus(ctx).await.unwrap();
    assert_eq!(
        browser.take_calls(),
        vec![
            BrowserCall::UpdateWindow {
                window: action_window,
                update: WindowUpdate::focus(),
            },
            BrowserCall::ActivateTab(c2_action.tab()),
            BrowserCall::ActivateTab(c2.tab()),
        ]
    );
    assert_eq!(browser.window(action_window).unwrap().state, WindowState::Maximized);

    // Already in sync: only the customer tab is reactivated
    c2.focus(ctx).await.unwrap();
    assert_eq!(browser.take_calls(), vec![BrowserCall::ActivateTab(c2.tab())]);
}

#[tokio::test]
async fn test_focus_ignores_unrelated_action_window_content() {
    let (browser, coordinator) = setup_quiet();
    let main = browser.insert_window();
    register_customer(&coordinator, &browser, main, 10, "1").await;
    coordinator
        .handle_request(Request::open("https://docs.example/manual", None))
        .await
        .unwrap();

    let c1 = coordinator.context().registry().customer("1").unwrap();
    browser.take_calls();
    c1.focus(coordinator.context()).await.unwrap();
    assert!(browser.calls().is_empty());
}

#[tokio::test]
async fn test_activating_action_notifies_customer_page() {
    let (browser, coordinator) = setup_quiet();
    let main = browser.insert_window();
    register_customer(&coordinator, &browser, main, 10, "42").await;
    open_action(&coordinator, "42", "7").await;
    let action = coordinator.context().registry().action("42:7").unwrap();

    coordinator
        .handle_event(BrowserEvent::TabActivated {
            tab: action.tab(),
            window: action.window(),
        })
        .await
        .unwrap();

    assert_eq!(
        browser.notifications(),
        vec![(TabId(10), Notification::select("42", "7"))]
    );
}

#[tokio::test]
async fn test_window_focus_on_customer_syncs_action_window() {
    let (browser, coordinator) = setup_quiet();
    let main = browser.insert_window();
    register_customer(&coordinator, &browser, main, 10, "1").await;
    register_customer(&coordinator, &browser, main, 11, "2").await;
    open_action(&coordinator, "2", "9").await;
    let action_window = coordinator.context().action_window().id().unwrap();

    // User switches to customer 1, which has no actions
    TabController::activate(browser.as_ref(), TabId(10)).await.unwrap();
    browser.take_calls();

    coordinator
        .handle_event(BrowserEvent::WindowFocusChanged { window: Some(main) })
        .await
        .unwrap();

    assert_eq!(
        browser.take_calls(),
        vec![BrowserCall::UpdateWindow {
            window: action_window,
            update: WindowUpdate::state(WindowState::Minimized),
        }]
    );
}

#[tokio::test]
async fn test_closing_action_minimizes_window_showing_other_customer() {
    let (browser, coordinator) = setup_quiet();
    let main = browser.insert_window();
    register_customer(&coordinator, &browser, main, 10, "1").await;
    register_customer(&coordinator, &browser, main, 11, "2").await;
    open_action(&coordinator, "1", "a").await;
    open_action(&coordinator, "1", "c").await;
    open_action(&coordinator, "2", "b").await;
    let closed = coordinator.context().registry().action("1:a").unwrap();
    let action_window = coordinator.context().action_window().id().unwrap();

    // The action window still shows customer 2's action
    browser.close_tab(closed.tab()).unwrap();
    browser.take_calls();
    coordinator
        .handle_event(BrowserEvent::TabRemoved { tab: closed.tab() })
        .await
        .unwrap();

    assert_eq!(
        browser.take_calls(),
        vec![
            BrowserCall::UpdateWindow {
                window: action_window,
                update: WindowUpdate::state(WindowState::Minimized),
            },
            BrowserCall::Send {
                tab: TabId(10),
                notification: Notification::closed("1:a", None),
            },
        ]
    );
    assert_eq!(browser.window(action_window).unwrap().state, WindowState::Minimized);
}

#[tokio::test]
async fn test_closing_action_keeps_window_showing_same_customer() {
    let (browser, coordinator) = setup_quiet();
    let main = browser.insert_window();
    register_customer(&coordinator, &browser, main, 10, "1").await;
    open_action(&coordinator, "1", "a").await;
    open_action(&coordinator, "1", "c").await;
    let closed = coordinator.context().registry().action("1:a").unwrap();
    let action_window = coordinator.context().action_window().id().unwrap();

    // The action window shows customer 1's other action
    browser.close_tab(closed.tab()).unwrap();
    browser.take_calls();
    coordinator
        .handle_event(BrowserEvent::TabRemoved { tab: closed.tab() })
        .await
        .unwrap();

    assert_eq!(
        browser.take_calls(),
        vec![BrowserCall::Send {
            tab: TabId(10),
            notification: Notification::closed("1:a", None),
        }]
    );
    assert_eq!(browser.window(action_window).unwrap().state, WindowState::Maximized);
}

#[tokio::test]
async fn test_focus_lost_is_ignored() {
    let (browser, coordinator) = setup_quiet();
    coordinator
        .handle_event(BrowserEvent::WindowFocusChanged { window: None })
        .await
        .unwrap();
    assert!(browser.calls().is_empty());
}

// ============================================================================
// Action Window
// ============================================================================

#[tokio::test]
async fn test_actions_of_all_customers_share_one_window() {
    let (browser, coordinator, mut events) = setup();
    let main = browser.insert_window();
    register_customer(&coordinator, &browser, main, 10, "1").await;
    register_customer(&coordinator, &browser, main, 11, "2").await;

    let (a, b, c) = tokio::join!(
        coordinator.handle_request(Request::open(action_url("1", "a"), Some("1:a"))),
        coordinator.handle_request(Request::open(action_url("2", "b"), Some("2:b"))),
        coordinator.handle_request(Request::open("https://docs.example/", None)),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();
    pump(&coordinator, &mut events).await;

    let action_window = coordinator.context().action_window().id().unwrap();
    assert_eq!(browser.window_count(), 2);
    let registry = coordinator.context().registry();
    for action in registry.actions() {
        assert_eq!(action.window(), action_window);
    }
    assert_eq!(registry.actions().len(), 2);
}

#[tokio::test]
async fn test_closed_action_window_is_recreated() {
    let (browser, coordinator, mut events) = setup();
    let main = browser.insert_window();
    register_customer(&coordinator, &browser, main, 10, "42").await;
    open_action(&coordinator, "42", "1").await;
    pump(&coordinator, &mut events).await;
    let first = coordinator.context().action_window().id().unwrap();

    // User closes the whole action window
    browser.close_window(first).unwrap();
    pump(&coordinator, &mut events).await;
    assert_eq!(coordinator.context().action_window().id(), None);
    assert!(!coordinator.context().registry().has("42:1"));

    open_action(&coordinator, "42", "2").await;
    pump(&coordinator, &mut events).await;
    let second = coordinator.context().action_window().id().unwrap();
    assert_ne!(first, second);
    assert!(coordinator.context().registry().has("42:2"));
}

#[tokio::test]
async fn test_open_existing_action_activates_it() {
    let (browser, coordinator) = setup_quiet();
    let main = browser.insert_window();
    register_customer(&coordinator, &browser, main, 10, "42").await;
    open_action(&coordinator, "42", "1").await;
    open_action(&coordinator, "42", "2").await;
    let first = coordinator.context().registry().action("42:1").unwrap();
    browser.take_calls();

    open_action(&coordinator, "42", "1").await;

    assert_eq!(browser.calls(), vec![BrowserCall::ActivateTab(first.tab())]);
    assert_eq!(coordinator.context().registry().actions().len(), 2);
}

#[tokio::test]
async fn test_concurrent_opens_of_same_action_register_once() {
    let (browser, coordinator) = setup_quiet();
    let main = browser.insert_window();
    register_customer(&coordinator, &browser, main, 10, "42").await;

    tokio::join!(
        open_action(&coordinator, "42", "7"),
        open_action(&coordinator, "42", "7"),
    );

    let registry = coordinator.context().registry();
    let customer = registry.customer("42").unwrap();
    let action = registry.action("42:7").unwrap();
    assert_eq!(customer.action_count(), 1);
    assert!(Arc::ptr_eq(&customer.find_action("7").unwrap(), &action));
    assert!(Arc::ptr_eq(&registry.action(action.tab()).unwrap(), &action));
    assert_eq!(registry.actions().len(), 1);

    // The duplicate tab was closed again
    assert_eq!(browser.tab_count(), 2);
}

#[tokio::test]
async fn test_open_bare_customer_id_activates_customer_tab() {
    let (browser, coordinator) = setup_quiet();
    let main = browser.insert_window();
    register_customer(&coordinator, &browser, main, 10, "42").await;
    register_customer(&coordinator, &browser, main, 11, "43").await;
    browser.take_calls();

    coordinator
        .handle_request(Request::open(customer_url("42"), Some("42")))
        .await
        .unwrap();

    assert_eq!(browser.calls(), vec![BrowserCall::ActivateTab(TabId(10))]);
    assert_eq!(coordinator.context().action_window().id(), None);
}
