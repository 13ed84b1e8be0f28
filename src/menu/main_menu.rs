use crate::config::{ArtifactKind, Config};
use crate::menu::handlers::{run_scene_extractor, show_current_settings};
use anyhow::Result;
use console::{Term, style};
use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub fn show_main_menu(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &Config,
) -> Result<bool> {
    term.clear_screen()?;

    println!("{}", style("=== 影片場景擷取 ===").cyan().bold());
    println!("{}", style("(按 ESC 離開)").dim());

    let options = vec!["擷取場景畫面", "擷取場景片段", "檢視目前設定", "離開"];

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("請選擇功能")
        .items(&options)
        .default(0)
        .interact_on_opt(term)?;

    match selection {
        Some(0) => {
            run_scene_extractor(term, shutdown_signal, config, ArtifactKind::Frame)?;
            Ok(true)
        }
        Some(1) => {
            run_scene_extractor(term, shutdown_signal, config, ArtifactKind::Clip)?;
            Ok(true)
        }
        Some(2) => {
            show_current_settings(term, config)?;
            Ok(true)
        }
        Some(3) | None => Ok(false),
        Some(_) => unreachable!(),
    }
}
