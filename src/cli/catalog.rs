//! Built-in demo modules that `run` and `check` resolve `app = "..."` keys
//! against.
//!
//! | Key             | Behaviour                                   |
//! |-----------------|---------------------------------------------|
//! | `logging`       | every hook logs and succeeds                |
//! | `slow`          | like `logging`, mount takes 100 ms          |
//! | `failing-mount` | mount rejects                               |
//! | `unavailable`   | the loader rejects                          |
//! | `invalid`       | the module has no `unmount` export          |

use std::time::Duration;

use tracing::info;

use crate::domain::{hook, loader, static_loader, Hook, Module, ModuleExports, Phase, Props};
use crate::registration::LoaderCatalog;

fn logging_hook(phase: Phase) -> Hook {
    hook(move |props: Props| async move {
        info!(app = %props.name, phase = %phase, "Demo hook called");
        Ok(())
    })
}

fn logging_module() -> ModuleExports {
    [
        Phase::Bootstrap,
        Phase::Mount,
        Phase::Unmount,
        Phase::Unload,
        Phase::Update,
    ]
    .into_iter()
    .fold(ModuleExports::new(), |exports, phase| {
        exports.hook(phase.as_str(), logging_hook(phase))
    })
}

fn slow_mount() -> Hook {
    hook(|props: Props| async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        info!(app = %props.name, "Demo slow mount finished");
        Ok(())
    })
}

fn failing_mount() -> Hook {
    hook(|props: Props| async move { Err(anyhow::anyhow!("{} refuses to mount", props.name)) })
}

/// Catalog of the demo modules.
pub fn demo_catalog() -> LoaderCatalog {
    LoaderCatalog::new()
        .with("logging", static_loader(Module::from(logging_module())))
        .with(
            "slow",
            static_loader(Module::from(logging_module().hook("mount", slow_mount()))),
        )
        .with(
            "failing-mount",
            static_loader(Module::from(logging_module().hook("mount", failing_mount()))),
        )
        .with(
            "unavailable",
            loader(|props: Props| async move {
                Err(anyhow::anyhow!("no bundle published for {}", props.name))
            }),
        )
        .with(
            "invalid",
            static_loader(Module::from(
                ModuleExports::new().hook("mount", logging_hook(Phase::Mount)),
            )),
        )
}
