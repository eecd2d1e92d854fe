//! Integration tests for armature-nonce

use armature_nonce::*;
use chrono::Duration;
use std::sync::Arc;

const DAY: u64 = 86_400;
const ACTION: &str = "action";
const BINDING_NAME: &str = "request";

fn secret() -> Arc<StaticSecret> {
    Arc::new(StaticSecret::new(b"test_secret_key_32_bytes_long!!!".to_vec()).unwrap())
}

fn frozen_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::from_timestamp(1_700_006_400))
}

fn nonce_manager(clock: Arc<FixedClock>) -> NonceManager {
    NonceManager::builder()
        .action(ACTION)
        .binding_name(BINDING_NAME)
        .lifetime(DAY)
        .clock(clock)
        .secret(secret())
        .build()
        .unwrap()
}

#[test]
fn test_constructor_with_lifetime() {
    let registry = LifetimeRegistry::default();
    let manager = NonceManager::builder()
        .action(ACTION)
        .binding_name(BINDING_NAME)
        .lifetime(DAY)
        .secret(secret())
        .registry(Arc::new(registry.clone()))
        .build()
        .unwrap();

    assert_eq!(manager.action(), ACTION);
    assert_eq!(manager.binding_name(), BINDING_NAME);
    assert_eq!(manager.lifetime(), DAY);
    assert_eq!(registry.registrations(), 1);
}

#[test]
fn test_constructor_without_lifetime() {
    let registry = LifetimeRegistry::default();
    let manager = NonceManager::builder()
        .action(ACTION)
        .binding_name(BINDING_NAME)
        .secret(secret())
        .registry(Arc::new(registry.clone()))
        .build()
        .unwrap();

    assert_eq!(manager.lifetime(), DEFAULT_LIFETIME);
    assert_eq!(registry.registrations(), 0);
}

#[test]
fn test_accessors() {
    let mut manager = nonce_manager(frozen_clock());

    manager.set_binding_name("_wpnonce");
    manager.set_token("0123456789");
    manager.set_field("<input />");
    manager.set_url("http://example.com/");

    assert_eq!(manager.binding_name(), "_wpnonce");
    assert_eq!(manager.token(), "0123456789");
    assert_eq!(manager.field(), "<input />");
    assert_eq!(manager.url(), "http://example.com/");
}

#[test]
fn test_issue() {
    let mut manager = nonce_manager(frozen_clock());
    let token = manager.issue().unwrap();

    assert_eq!(token, manager.token());
    assert_eq!(manager.issue().unwrap(), token);
}

#[test]
fn test_create_field() {
    let mut manager = nonce_manager(frozen_clock());

    let field = manager.create_field(false).unwrap();
    let token = manager.token().to_string();
    assert!(field.contains(&format!(r#"name="{}" value="{}""#, BINDING_NAME, token)));
    assert!(!field.contains("_http_referer"));

    let field = manager.create_field(true).unwrap();
    assert!(field.contains(&format!(r#"name="{}" value="{}""#, BINDING_NAME, token)));
    assert!(field.contains(r#"name="_http_referer""#));
    assert_eq!(field, manager.field());
}

#[test]
fn test_create_field_with_custom_renderer() {
    struct PlainRenderer;

    impl FieldRenderer for PlainRenderer {
        fn render_field(&self, binding_name: &str, token: &str, include_referer: bool) -> String {
            let mut field = format!("{}={}", binding_name, token);
            if include_referer {
                field.push_str(";referer");
            }
            field
        }
    }

    let mut manager = NonceManager::builder()
        .action(ACTION)
        .binding_name(BINDING_NAME)
        .secret(secret())
        .field_renderer(Arc::new(PlainRenderer))
        .build()
        .unwrap();

    let field = manager.create_field(true).unwrap();
    assert_eq!(field, format!("request={};referer", manager.token()));
}

#[test]
fn test_create_url() {
    let mut manager = nonce_manager(frozen_clock());
    let base = "http://example.com/";

    let url = manager.create_url(base).unwrap();
    assert!(url.starts_with(base));
    assert!(url.contains(&format!("{}={}", BINDING_NAME, manager.token())));
    assert_eq!(url, manager.url());
}

#[test]
fn test_verification() {
    let clock = frozen_clock();
    let mut manager = nonce_manager(clock.clone());

    let token = manager.issue().unwrap();
    assert!(manager.verify(Some(&token)).unwrap());

    let forged = format!("not-valid{}", token);
    assert!(!manager.verify(Some(&forged)).unwrap());

    // Token taken from the request parameters
    let mut incoming = nonce_manager(clock);
    incoming.set_parameters(Arc::new(ParameterMap::new().with(BINDING_NAME, token.clone())));
    assert!(incoming.verify(None).unwrap());
}

#[test]
fn test_auto_resolution_matches_explicit_verification() {
    let clock = frozen_clock();
    let token = nonce_manager(clock.clone()).issue().unwrap();
    clock.advance(Duration::hours(13));

    let mut explicit = nonce_manager(clock.clone());
    let mut resolved = nonce_manager(clock);
    resolved.set_parameters(Arc::new(
        ParameterMap::from_query(&format!("{}={}", BINDING_NAME, token)).unwrap(),
    ));

    assert_eq!(resolved.age(None).unwrap(), explicit.age(Some(&token)).unwrap());
}

#[test]
fn test_get_nonce_age() {
    let mut manager = nonce_manager(frozen_clock());
    let token = manager.issue().unwrap();
    assert_eq!(manager.age(Some(&token)).unwrap(), NonceAge::Fresh);
}

#[test]
fn test_aging_boundaries() {
    // 1_700_006_400 is a multiple of 43_200, the start of a tick
    let clock = frozen_clock();
    let mut manager = nonce_manager(clock.clone());
    let token = manager.issue().unwrap();

    clock.advance(Duration::seconds(43_199));
    assert_eq!(manager.age(Some(&token)).unwrap(), NonceAge::Fresh);

    clock.advance(Duration::seconds(1));
    assert_eq!(manager.age(Some(&token)).unwrap(), NonceAge::Stale);

    clock.advance(Duration::seconds(43_200));
    assert_eq!(manager.age(Some(&token)).unwrap(), NonceAge::Invalid);
}

#[test]
fn test_token_from_another_secret_is_invalid() {
    let clock = frozen_clock();
    let mut other = NonceManager::builder()
        .action(ACTION)
        .binding_name(BINDING_NAME)
        .clock(clock.clone())
        .secret(Arc::new(StaticSecret::generate()))
        .build()
        .unwrap();
    let token = other.issue().unwrap();

    assert_eq!(nonce_manager(clock).age(Some(&token)).unwrap(), NonceAge::Invalid);
}

#[test]
fn test_manager_from_config() {
    let config = NonceConfig::new(b"test_secret_key_32_bytes_long!!!".to_vec())
        .unwrap()
        .with_lifetime(3_600);

    let mut issuer = NonceManager::from_config(&config, ACTION, BINDING_NAME).unwrap();
    let mut verifier = NonceManager::from_config(&config, ACTION, BINDING_NAME).unwrap();

    let token = issuer.issue().unwrap();
    assert!(verifier.verify(Some(&token)).unwrap());
}

#[test]
fn test_shared_registry_tracks_last_lifetime() {
    let registry = LifetimeRegistry::default();
    let build = |lifetime: u64| {
        NonceManager::builder()
            .action(ACTION)
            .binding_name(BINDING_NAME)
            .lifetime(lifetime)
            .secret(secret())
            .registry(Arc::new(registry.clone()))
            .build()
            .unwrap()
    };

    let first = build(600);
    let second = build(1_200);

    assert_eq!(first.lifetime(), 600);
    assert_eq!(second.lifetime(), 1_200);
    assert_eq!(registry.default_lifetime(), 1_200);
    assert_eq!(registry.registrations(), 2);
}
