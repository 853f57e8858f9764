use std::io::{stdin, stdout, Write};
use std::sync::Arc;
use log::{info, error, warn};
use env_logger::Env;
use weakbus::error::BusError;
use weakbus::weakbus::demo::{KlasseA, KlasseB, NachrichtVonA};
use weakbus::weakbus::{BusConfig, LivenessToken, MessageBus};

const CONFIG_FILE: &str = "weakbus.toml";

fn init_logger() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}:{}] {} - {}",
                buf.timestamp_millis(),
                record.module_path().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn prompt(label: &str) -> Option<String> {
    print!("{label}");
    if let Err(e) = stdout().flush() {
        warn!("Failed to flush stdout: {}", e);
    }
    let mut input = String::new();
    match stdin().read_line(&mut input) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(input.trim().to_string()),
    }
}

/// A fragt, B antwortet; danach wird das Topic von A entfernt
fn mediator_demo(config: &BusConfig) -> Result<(), BusError> {
    let bus = Arc::new(MessageBus::with_config(config.clone()));

    let a = KlasseA::new(bus.clone());
    let b = KlasseB::new(bus.clone());

    let first = a.start()?;
    info!("Erster Start: {} Zustellung(en), A hat {} Antwort(en)", first.delivered, a.received().len());

    // Referenz entfernen
    bus.remove_topic::<NachrichtVonA>();
    info!("Verbleibende Topics: {}", bus.topic_count());

    // Klasse B reagiert NICHT mehr
    let second = a.start()?;
    info!("Zweiter Start: {} Zustellung(en), B hat {} Anfrage(n)", second.delivered, b.received().len());
    Ok(())
}

/// Subscriber fällt weg, ohne sich abzumelden
fn weak_demo(config: &BusConfig) -> Result<(), BusError> {
    let bus = MessageBus::with_config(config.clone());
    info!("Bus {} mit Fehlerstrategie {:?}", bus.config().name, bus.config().error_policy);

    {
        let token = LivenessToken::new();
        bus.subscribe_guarded(&token, |msg: &NachrichtVonA| {
            info!("Temporärer Empfänger: {}", msg.text);
            Ok(())
        });
        info!("Abonnenten vorher: {}", bus.subscriber_count::<NachrichtVonA>());
    }

    let delivery = bus.publish(&NachrichtVonA {
        text: "Hallo ins Leere".to_string(),
        zahl: 0,
    })?;
    info!(
        "Zugestellt: {}, bereinigt: {}, Abonnenten nachher: {}",
        delivery.delivered,
        delivery.pruned,
        bus.subscriber_count::<NachrichtVonA>()
    );
    Ok(())
}

fn stats_demo(config: &BusConfig) -> Result<(), BusError> {
    let bus = Arc::new(MessageBus::with_config(config.clone()));
    let _a = KlasseA::new(bus.clone());
    let _b = KlasseB::new(bus.clone());

    println!("{}", bus.stats().to_json()?);
    Ok(())
}

fn report(e: &BusError) {
    match e.code() {
        Some(code) => error!("❌ Demo failed [{} / {}]: {e}", code, code.category()),
        None => error!("❌ Demo failed: {e}"),
    }
}

fn main() {
    init_logger();

    info!("Mediator demo starting up");

    let config = match BusConfig::from_toml_file_or_default(CONFIG_FILE) {
        Ok(config) => {
            info!("Configuration loaded successfully");
            config
        },
        Err(e) => {
            error!("Failed to load configuration from {}: {}", CONFIG_FILE, e);
            std::process::exit(1);
        }
    };

    loop {
        println!();
        println!("1 = Mediator Demo");
        println!("2 = Weak-Reference Demo");
        println!("3 = Statistik (JSON)");
        println!("X = Beenden");

        let Some(choice) = prompt("👉 Auswahl: ") else {
            break;
        };

        let result = match choice.to_uppercase().as_str() {
            "1" => mediator_demo(&config),
            "2" => weak_demo(&config),
            "3" => stats_demo(&config),
            "X" => break,
            _ => {
                println!("❌ Ungültige Auswahl");
                Ok(())
            }
        };

        if let Err(e) = result {
            report(&e);
        }
    }
}
