mod dialog;
mod paradigm;
mod surface;
mod visual;

use std::path::PathBuf;

use anyhow::Context;
use behex_core::{Key, Surface};
use behex_experiment::{
    BreakOptions, Experiment, Instructions, Navigation, Page, RunOptions,
};
use behex_io::Settings;
use tracing::info;

use dialog::PromptSubject;
use paradigm::ArrowTask;
use surface::WindowSurface;

const WELCOME_PAGE: &str = "Welcome!\n\
    \n\
    You will see arrows pointing left or right.\n\
    Press F for left and J for right, as fast as you can.";

const START_PAGE: &str = "There will be short breaks along the way.\n\
    \n\
    Press Enter to begin.";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    match run() {
        Err(err)
            if matches!(
                err.downcast_ref::<behex_core::Error>(),
                Some(behex_core::Error::Quit)
            ) =>
        {
            info!("quit key pressed, data flushed, exiting");
            Ok(())
        }
        other => other,
    }
}

fn run() -> anyhow::Result<()> {
    let base_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let settings = Settings::load(&base_dir.join("settings.json"))
        .context("loading settings")?;
    let surface =
        WindowSurface::new(&base_dir.join("assets").join("DejaVuSans.ttf"))?;
    let keys = surface.key_source();
    let mut exp = Experiment::new(
        settings,
        surface,
        Box::new(keys),
        None,
        None,
        base_dir.join("data"),
    )?;

    exp.collect_subject(&mut PromptSubject)?;
    exp.calibrate(25, None)?;

    ArrowTask::build_stimuli(&mut exp);
    let trials = ArrowTask::build_trials(&mut exp, 20)?;
    exp.set_trials(trials);

    let navigation = Navigation::from_mapping(&exp.mapping)
        .with_finish_key(Key::code("return"));
    let pages = vec![
        Page::Text(WELCOME_PAGE.to_string()),
        Page::Text(START_PAGE.to_string()),
    ];
    let mut instructions = Instructions::new(pages, navigation);
    instructions.present(&mut exp, None, None)?;

    let mut task = ArrowTask { feedback: true };
    let opts = RunOptions {
        breaks: BreakOptions {
            text: Some(
                "Take a short break.\nPress any key to continue.".into(),
            ),
            show_correctness: true,
            ..BreakOptions::default()
        },
        ..RunOptions::default()
    };
    let outcome = exp.run_trials(&mut task, None, &opts)?;
    info!(?outcome, "all trials done");
    exp.save_data("")?;

    let goodbye = exp.surface.make_text("Thank you!")?;
    exp.surface.draw(&goodbye)?;
    exp.surface.flip()?;
    exp.clear_input();
    exp.input.wait_key_checked(None, exp.mapping.quit_key())?;
    Ok(())
}
