//! Basic circuit breaker and notification usage

use fusebox::{CircuitBreaker, EventBus, Publisher};
use std::sync::Arc;

fn main() {
    println!("=== Circuit Breaker Basic Example ===\n");

    // Create a circuit with builder API
    let circuit = CircuitBreaker::builder("payment_api")
        .failure_threshold(3)
        .cool_off_secs(5.0)
        .on_open(|name| println!("🔴 Circuit '{}' opened!", name))
        .build();

    println!("Initial state: {}\n", circuit.state_name());

    // Simulate successful calls
    println!("--- Successful calls ---");
    for i in 1..=2 {
        match circuit.call(move || Ok::<_, String>(format!("Payment {}", i))) {
            Ok(result) => println!("✓ {}", result),
            Err(e) => println!("✗ Error: {}", e),
        }
    }
    println!("State: {}\n", circuit.state_name());

    // Simulate failures
    println!("--- Triggering failures ---");
    for i in 1..=3 {
        match circuit.call(move || Err::<String, _>(format!("Payment failed {}", i))) {
            Ok(_) => println!("✓ Success"),
            Err(e) => println!("✗ {}", e),
        }
    }
    println!("State: {} (circuit opened)\n", circuit.state_name());

    // Try calling while open
    println!("--- Attempting call while open ---");
    match circuit.call(|| Ok::<_, String>("Should be rejected")) {
        Ok(_) => println!("✓ Success"),
        Err(e) => println!("✗ {}", e),
    }
    println!();

    // Reset and demonstrate recovery
    println!("--- Resetting circuit ---");
    circuit.reset();
    println!("State after reset: {}\n", circuit.state_name());

    // Notifications flowing through a protected call
    println!("--- Publisher behind the breaker ---");
    let publisher: Arc<Publisher<String>> = Arc::new(Publisher::new());
    publisher.subscribe(|event| println!("  observer 1 received: {}", event));
    publisher.subscribe(|event| println!("  observer 2 received: {}", event));

    let publisher_clone = Arc::clone(&publisher);
    match circuit.call(move || {
        publisher_clone.notify(&"payment settled".to_string());
        Ok::<_, String>(())
    }) {
        Ok(()) => println!("✓ Notification delivered"),
        Err(e) => println!("✗ {}", e),
    }
    println!();

    // Named events with one-shot subscriptions
    println!("--- Event bus ---");
    let bus: EventBus<String> = EventBus::new();

    let sub = bus.on("login", |user| println!("  user logged in: {}", user));
    bus.once("payment", |amount| println!("  first payment only: {}", amount));

    bus.emit("login", &"neeraj".to_string());
    bus.emit("payment", &"500".to_string());
    bus.emit("payment", &"999 (ignored by once)".to_string());

    bus.off(&sub);
    bus.emit("login", &"next guy (nobody listens)".to_string());

    println!("\nFinal state: {}", circuit.state_name());
}
