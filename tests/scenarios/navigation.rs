/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::path::Path;

use opensphere_shell::services::app_path::{AppResolver, BuildMode};
use opensphere_shell::shell::desktop::lifecycle::navigation_policy::{NavigationAction, NavigationEvent};
use opensphere_shell::shell::desktop::host::app_env::AppEnv;
use opensphere_shell::test_utils::{app_table, coordinator, coordinator_at, shell_config};

#[test]
fn in_app_hash_route_is_left_alone() {
    let (mut windows, opener) = coordinator(&shell_config(&[]));
    let main = windows.create_main_window();
    let url = "file:///base/opensphere/index.html#/view";

    for event in [
        NavigationEvent::WillNavigate { url: url.to_string() },
        NavigationEvent::NewWindow { url: url.to_string() },
    ] {
        let outcome = windows.handle_event(main, &event);
        assert_eq!(outcome.action, NavigationAction::Allow);
        assert!(!outcome.prevent_default);
        assert_eq!(outcome.opened, None);
    }
    assert_eq!(windows.host().url(main), Some("file:///base/opensphere/index.html"));
    assert!(opener.opened().is_empty());
}

#[test]
fn relative_base_path_keeps_app_pages_internal() {
    let env = AppEnv::new(BuildMode::Production, "apps");
    let expected_home = format!(
        "{}#/view",
        url::Url::from_file_path(std::env::current_dir().unwrap().join("apps/opensphere/index.html")).unwrap()
    );
    let (mut windows, opener) = coordinator_at(&shell_config(&[]), env);
    let main = windows.create_main_window();
    let home = windows.home_url().unwrap().to_string();
    assert_eq!(format!("{home}#/view"), expected_home);

    let outcome = windows.handle_event(main, &NavigationEvent::WillNavigate { url: expected_home });
    assert_eq!(outcome.action, NavigationAction::Allow);
    assert!(!outcome.prevent_default);
    assert!(opener.opened().is_empty());
}

#[test]
fn external_link_goes_to_the_system_browser() {
    let (mut windows, opener) = coordinator(&shell_config(&[]));
    let main = windows.create_main_window();

    let outcome = windows.handle_event(
        main,
        &NavigationEvent::WillNavigate {
            url: "https://example.com/other".to_string(),
        },
    );

    assert!(outcome.prevent_default);
    assert_eq!(opener.opened(), vec!["https://example.com/other".to_string()]);
    assert_eq!(windows.host().url(main), Some("file:///base/opensphere/index.html"));
}

#[test]
fn sitemap_is_not_mistaken_for_map() {
    let resolver = AppResolver::new(app_table(&["map", "sitemap"]), BuildMode::Production);
    let url = "file:///base/app/sitemap/index.html";
    for _ in 0..3 {
        assert_eq!(resolver.match_app_for_url(url).as_deref(), Some("sitemap"));
    }
}

#[test]
fn resolve_path_is_stable() {
    let resolver = AppResolver::new(app_table(&["opensphere", "tools"]), BuildMode::Debug);
    let base = Path::new("/base");
    let first = resolver.resolve_path("tools", base);
    assert_eq!(resolver.resolve_path("tools", base), first);
    assert_eq!(first, Path::new("/base/tools"));
}

#[test]
fn other_app_link_opens_a_cascaded_window() {
    let (mut windows, _) = coordinator(&shell_config(&["tools"]));
    let main = windows.create_main_window();

    let outcome = windows.handle_event(
        main,
        &NavigationEvent::NewWindow {
            url: "file:///base/tools?layer=1".to_string(),
        },
    );

    let opened = outcome.opened.unwrap();
    assert_eq!(
        windows.host().url(opened),
        Some("file:///base/tools/index.html?layer=1")
    );
    assert_eq!(windows.current_app(opened), Some("tools"));

    let main_bounds = windows.host().window(main).unwrap().options.bounds;
    let opened_bounds = windows.host().window(opened).unwrap().options.bounds;
    assert_eq!(opened_bounds.x, Some(main_bounds.x.unwrap_or(0) + 25));
    assert_eq!(opened_bounds.width, main_bounds.width);
}
