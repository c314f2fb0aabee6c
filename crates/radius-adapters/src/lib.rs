//! Orchestrator adapters (spec §4.5, §6): translate each supported wire
//! format to and from the canonical event/result model.

pub mod adapter;
pub mod claude_telegram;
pub mod common;
pub mod generic;
pub mod nanobot;
pub mod openclaw;

pub use adapter::Adapter;
pub use claude_telegram::ClaudeTelegramAdapter;
pub use generic::GenericAdapter;
pub use nanobot::NanobotAdapter;
pub use openclaw::OpenClawAdapter;

use radius_core::Framework;

/// The adapter matching a framework's canonical wire format.
pub fn adapter_for(framework: Framework) -> Box<dyn Adapter> {
    match framework {
        Framework::Openclaw => Box::new(OpenClawAdapter),
        Framework::Nanobot => Box::new(NanobotAdapter),
        Framework::ClaudeTelegram => Box::new(ClaudeTelegramAdapter),
        Framework::Generic => Box::new(GenericAdapter),
    }
}
