//! # Module Tests
//!
//! - Re-entrancy: a module instance configures once
//! - SingletonModule: installed once per environment
//! - Duplicate bindings across plain modules
//! - Failing modules do not stop their siblings
//! - Stages: what gets primed at creation
//! - Source attribution: library call sites fall back to the module

use binderkit::{
    AbstractModule, Binder, BinderExt, ConfigError, Configure, Element, Elements, FixSuggestion,
    Injector, Key, LazySingletonModule, Module, ModuleState, PrivateBinderExt, RecordingBinder,
    SingletonModule, Source, Stage, VBinder,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// TEST HELPERS
// ============================================================================

trait Thing: Send + Sync {}

struct ThingA;

impl Thing for ThingA {}

/// Body binding the unqualified `dyn Thing`
struct ThingBody;

impl Configure for ThingBody {
    fn configure(&mut self, binder: &VBinder) {
        binder.bind::<dyn Thing>().to_arc(Arc::new(ThingA));
    }
}

/// Plain module with the same binding, no dedup
struct PlainThingModule;

impl Module for PlainThingModule {
    fn configure(&mut self, binder: &dyn Binder) {
        binder.bind::<dyn Thing>().to_arc(Arc::new(ThingA));
    }
}

/// Show recorder warnings with RUST_LOG=binderkit=warn
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let counter = Arc::new(AtomicUsize::new(0));
    (Arc::clone(&counter), counter)
}

// ============================================================================
// RE-ENTRANCY
// ============================================================================

#[test]
fn test_second_configure_is_rejected() {
    init_tracing();
    let (runs, counted) = counter();
    let mut module = AbstractModule::from_fn(move |_binder| {
        counted.fetch_add(1, Ordering::SeqCst);
    });
    let binder = RecordingBinder::new(Stage::Development);

    binder.install(&mut module);
    assert_eq!(module.state(), ModuleState::Configured);
    binder.install(&mut module);

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    let errors: Vec<ConfigError> = binder
        .elements()
        .into_iter()
        .filter_map(|element| match element {
            Element::Error(error) => Some(error),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::Reentry { module, at } => {
            assert_eq!(at, &Source::Module(*module));
        }
        other => panic!("expected Reentry, got {:?}", other),
    }

    let error = Injector::from_binder(&binder).unwrap_err();
    assert!(error.mentions("Re-entry is not allowed"));
    assert!(error.errors[0].fix_suggestion().is_some());
}

#[test]
fn test_reentry_into_another_environment_is_rejected() {
    let (runs, counted) = counter();
    let mut module = AbstractModule::from_fn(move |binder| {
        counted.fetch_add(1, Ordering::SeqCst);
        binder.bind::<u8>().to_instance(1);
    });

    let first = RecordingBinder::new(Stage::Development);
    let second = RecordingBinder::new(Stage::Development);
    first.install(&mut module);
    second.install(&mut module);

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(Injector::from_binder(&first).is_ok());
    assert!(Injector::from_binder(&second).unwrap_err().mentions("Re-entry"));
}

#[test]
fn test_module_body_receives_extended_binder() {
    let seen = Arc::new(parking_lot::Mutex::new(None));
    let captured = Arc::clone(&seen);
    let binder = RecordingBinder::new(Stage::Development);

    binder.install(&mut AbstractModule::from_fn(move |binder| {
        // decorating again is a no-op
        let same = VBinder::ptr_eq(binder, &VBinder::of(binder));
        *captured.lock() = Some((binder.id(), same));
    }));

    assert_eq!(*seen.lock(), Some((binder.id(), true)));
    assert!(binder.elements().is_empty());
}

// ============================================================================
// SINGLETON MODULE
// ============================================================================

#[test]
fn test_duplicate_plain_modules_fail() {
    let error = Injector::builder()
        .module(PlainThingModule)
        .module(PlainThingModule)
        .build()
        .unwrap_err();

    let expected = format!(
        "A binding to {} was already configured at ",
        std::any::type_name::<dyn Thing>()
    );
    assert!(error.mentions(&expected), "{}", error);
    assert!(matches!(error.errors[0], ConfigError::DuplicateBinding { .. }));
}

#[test]
fn test_singleton_modules_at_top_level() {
    let injector = Injector::builder()
        .module(SingletonModule::new(ThingBody))
        .module(SingletonModule::new(ThingBody))
        .build()
        .unwrap();

    assert!(injector.get_instance::<dyn Thing>().is_ok());
}

#[test]
fn test_singleton_modules_installed_by_a_module() {
    let injector = Injector::builder()
        .module(AbstractModule::from_fn(|binder| {
            binder.install_module(SingletonModule::new(ThingBody));
            binder.install_module(SingletonModule::new(ThingBody));
        }))
        .build()
        .unwrap();

    assert!(injector.get_instance::<dyn Thing>().is_ok());
}

#[test]
fn test_singleton_module_per_private_environment() {
    let injector = Injector::builder()
        .module(AbstractModule::from_fn(|binder| {
            let private = binder.new_private_binder();
            private.install_module(SingletonModule::new(ThingBody));
            let other = binder.new_private_binder();
            other.install_module(SingletonModule::new(ThingBody));
            other.expose::<dyn Thing>();
        }))
        .build();

    // each environment configures its own copy; only one is exposed
    assert!(injector.unwrap().get_instance::<dyn Thing>().is_ok());
}

// ============================================================================
// FAILURES
// ============================================================================

#[test]
fn test_panicking_module_does_not_stop_siblings() {
    init_tracing();
    let error = Injector::builder()
        .module(AbstractModule::from_fn(|_binder| panic!("misconfigured")))
        .module(AbstractModule::from_fn(|binder| {
            binder.bind::<u8>().to_instance(1);
            binder.bind::<u8>().to_instance(2);
        }))
        .build()
        .unwrap_err();

    assert_eq!(error.len(), 2);
    assert!(error.mentions("misconfigured"));
    assert!(matches!(error.errors[1], ConfigError::DuplicateBinding { .. }));
}

#[test]
fn test_errors_render_as_numbered_list() {
    let error = Injector::builder()
        .module(AbstractModule::from_fn(|binder| {
            binder.add_error("first problem");
            binder.add_config_error(ConfigError::custom("second problem"));
        }))
        .build()
        .unwrap_err();

    let text = error.to_string();
    assert!(text.starts_with("Unable to create injector"));
    assert!(text.contains("1) first problem"));
    assert!(text.contains("2) second problem"));
    assert!(text.contains("module_tests.rs"));
    assert!(text.ends_with("2 errors"));
}

// ============================================================================
// STAGES
// ============================================================================

fn staged(stage: Stage) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let (singleton_runs, singleton) = counter();
    let (eager_runs, eager) = counter();
    Injector::builder()
        .stage(stage)
        .module(AbstractModule::from_fn(move |binder| {
            let (singleton, eager) = (Arc::clone(&singleton), Arc::clone(&eager));
            binder
                .bind::<usize>()
                .named("singleton")
                .to_fn(move || Arc::new(singleton.fetch_add(1, Ordering::SeqCst)))
                .in_singleton();
            binder
                .bind::<usize>()
                .named("eager")
                .to_fn(move || Arc::new(eager.fetch_add(1, Ordering::SeqCst)))
                .as_eager_singleton();
        }))
        .build()
        .unwrap();
    (singleton_runs, eager_runs)
}

#[test]
fn test_priming_by_stage() {
    let cases = [
        (Stage::Tool, 0, 0),
        (Stage::Development, 0, 1),
        (Stage::Production, 1, 1),
    ];
    for (stage, singleton, eager) in cases {
        let (singleton_runs, eager_runs) = staged(stage);
        assert_eq!(singleton_runs.load(Ordering::SeqCst), singleton, "singleton in {}", stage);
        assert_eq!(eager_runs.load(Ordering::SeqCst), eager, "eager in {}", stage);
    }
}

#[test]
fn test_priming_failure_is_a_creation_error() {
    let error = Injector::builder()
        .stage(Stage::Production)
        .module(AbstractModule::from_fn(|binder| {
            binder
                .bind::<u8>()
                .to_factory(|_| Err(binderkit::ProvisionError::failed(binderkit::RawKey::of::<u8>(), "no disk")))
                .in_singleton();
        }))
        .build()
        .unwrap_err();

    assert!(error.mentions("Error priming u8"));
    assert!(error.mentions("no disk"));
}

#[test]
fn test_stage_parsing() {
    assert_eq!("production".parse::<Stage>().unwrap(), Stage::Production);
    assert_eq!(" Dev ".parse::<Stage>().unwrap(), Stage::Development);
    assert_eq!("tool".parse::<Stage>().unwrap(), Stage::Tool);
    assert!("staging".parse::<Stage>().is_err());
    assert_eq!(Stage::default(), Stage::Development);
    assert_eq!(serde_json::to_string(&Stage::Production).unwrap(), "\"production\"");
}

#[test]
fn test_stage_from_env() {
    std::env::set_var(binderkit::scope::STAGE_ENV_VAR, "prod");
    assert_eq!(Stage::from_env(), Stage::Production);
    std::env::set_var(binderkit::scope::STAGE_ENV_VAR, "nonsense");
    assert_eq!(Stage::from_env(), Stage::Development);
    std::env::remove_var(binderkit::scope::STAGE_ENV_VAR);
    assert_eq!(Stage::from_env(), Stage::Development);
}

// ============================================================================
// SOURCES
// ============================================================================

#[test]
fn test_library_call_sites_fall_back_to_module() {
    let elements = Elements::get_elements([
        Box::new(LazySingletonModule) as Box<dyn Module>,
        Box::new(AbstractModule::from_fn(|binder| {
            binder.bind::<u8>().to_instance(1);
        })),
    ]);

    match &elements[0] {
        Element::ScopeBinding(scope) => {
            assert_eq!(scope.source, Source::Module(std::any::type_name::<LazySingletonModule>()));
        }
        other => panic!("unexpected element {:?}", other),
    }
    match &elements[1] {
        Element::Binding(binding) => match &binding.source {
            Source::Location { file, .. } => assert!(file.ends_with("module_tests.rs")),
            other => panic!("unexpected source {}", other),
        },
        other => panic!("unexpected element {:?}", other),
    }
}

#[test]
fn test_with_source_overrides_call_site() {
    let injector = Injector::builder()
        .module(AbstractModule::from_fn(|binder| {
            binder
                .with_source(Source::declared("config.toml:3"))
                .bind::<u8>()
                .to_instance(1);
        }))
        .build()
        .unwrap();

    assert_eq!(
        injector.binding_source(Key::<u8>::get().raw()),
        Some(Source::declared("config.toml:3"))
    );
}
