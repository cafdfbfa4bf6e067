//! Quick benchmark to verify resolution performance

use binderkit::{
    AbstractModule, BinderExt, ExtendedBinder, Injector, Key, Lazy, VBinder,
};
use std::sync::Arc;
use std::time::Instant;

trait Service: Send + Sync {
    fn value(&self) -> usize;
}

struct Fixed(usize);

impl Service for Fixed {
    fn value(&self) -> usize {
        self.0
    }
}

fn injector() -> Injector {
    Injector::builder()
        .module(AbstractModule::from_fn(|binder: &VBinder| {
            binder.install_lazy_singleton_scope();
            binder.bind::<u64>().to_instance(7);
            binder.bind::<u32>().to_fn(|| Arc::new(7)).in_singleton();
            binder.bind::<usize>().to_fn(|| Arc::new(7));
            binder
                .bind::<dyn Service>()
                .to_fn(|| Arc::new(Fixed(7)) as Arc<dyn Service>);
            binder
                .bind::<dyn Service>()
                .named("linked")
                .to_key(Key::get());
            for value in 0..16 {
                binder
                    .in_set::<dyn Service>()
                    .add_binding()
                    .to_fn(move || Arc::new(Fixed(value)) as Arc<dyn Service>);
            }
            binder.bind_lazy::<String>().to_fn(|| Arc::new("lazy".to_string()));
        }))
        .build()
        .unwrap_or_else(|error| panic!("{}", error))
}

fn time<F: Fn()>(label: &str, iterations: u32, run: F) {
    // Warm up
    for _ in 0..1_000 {
        run();
    }

    let start = Instant::now();
    for _ in 0..iterations {
        run();
    }
    let elapsed = start.elapsed();

    println!("{}", label);
    println!("  Time for {} iterations: {:?}", iterations, elapsed);
    println!("  Per operation: {:?}\n", elapsed / iterations);
}

fn main() {
    // RUST_LOG=binderkit=debug shows the creation phases
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let start = Instant::now();
    let injector = injector();
    println!("Injector creation: {:?}\n", start.elapsed());

    println!("Resolution Performance Test");
    println!("===========================\n");

    let iterations = 100_000;

    time("Instance binding", iterations, || {
        let _ = injector.get_instance::<u64>();
    });

    time("Singleton binding", iterations, || {
        let _ = injector.get_instance::<u32>();
    });

    time("Unscoped provider", iterations, || {
        let _ = injector.get_instance::<usize>();
    });

    let linked = Key::<dyn Service>::named("linked");
    time("Linked binding", iterations, || {
        let _ = injector.get(&linked).map(|service| service.value());
    });

    time("Set of 16 elements", iterations / 10, || {
        let _ = injector.get_instance::<Vec<Arc<dyn Service>>>();
    });

    time("Lazy wrapper + first get", iterations, || {
        if let Ok(lazy) = injector.get_instance::<Lazy<String>>() {
            let _ = lazy.get();
        }
    });

    let lazy = injector
        .get_instance::<Lazy<String>>()
        .unwrap_or_else(|error| panic!("{}", error));
    time("Memoized lazy get", iterations * 10, || {
        let _ = lazy.get();
    });
}
