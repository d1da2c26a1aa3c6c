//! Narrate a short markdown-flavored message through a local synthesis
//! server.
//!
//! Start a TTS server on localhost:8000, then:
//!
//! ```bash
//! RUST_LOG=debug cargo run --example narrate
//! ```

use voicepipe::{EngineConfig, SpeakOptions, SpeechEngine};

fn main() {
    env_logger::init();

    let engine = SpeechEngine::new(EngineConfig::default());
    if !engine.is_available() {
        eprintln!(
            "no synthesis server at {} — start one and try again",
            engine.config().probe_addr()
        );
        return;
    }

    engine.set_volume(0.8);

    let message = "\
# Status update

The build finished **successfully** (in about two minutes).

```bash
cargo test --workspace
```

1. All tests passed.
2. Docs were regenerated.

Let me know if anything sounds off!";

    engine.speak(
        message,
        SpeakOptions {
            block: true,
            ..SpeakOptions::default()
        },
    );
}
