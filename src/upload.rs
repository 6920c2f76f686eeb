use std::{
    io::{self, BufRead, Write},
    sync::{Arc, mpsc},
    thread,
};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use log::{info, warn};

use crate::{
    cancel::CancelToken,
    cli::UploadArgs,
    config::Settings,
    events::SyncEvent,
    process,
    remote::RemoteTable,
    sync::{
        AutoConfirm, ChannelConfirm, Confirm, SyncEngine, SyncOutcome, SyncSettings, SyncState,
        UploadMode, UploadSummary,
    },
    worker::UploadSlot,
};

pub fn execute(args: &UploadArgs, settings: &mut Settings) -> Result<()> {
    let options = crate::process_options(&args.input, &args.modes, settings)?;
    settings.remember_input(&args.input.input);
    if let Some(overwrite) = args.overwrite() {
        settings.overwrite_mode = overwrite;
    }
    if let Some(batch_size) = args.batch_size {
        settings.batch_size = batch_size as usize;
    }
    if let Some(max_retries) = args.max_retries {
        settings.max_retries = max_retries;
    }

    let client = crate::connect_client(&args.remote, settings)?;
    let remote: Arc<dyn RemoteTable> = Arc::new(client);
    let sync_settings = SyncSettings {
        batch_size: settings.batch_size.max(1),
        retry: crate::retry_policy(settings.max_retries, args.retry_delay),
        mode: if settings.overwrite_mode {
            UploadMode::Overwrite
        } else {
            UploadMode::Append
        },
        ..SyncSettings::default()
    };
    info!(
        "Uploading '{}' in batches of {} ({} attempt(s) per call)",
        args.input.input.display(),
        sync_settings.batch_size,
        sync_settings.retry.max_attempts
    );

    let (answer_tx, answer_rx) = mpsc::channel();
    let mut confirm: Box<dyn Confirm> = if args.yes {
        Box::new(AutoConfirm(true))
    } else {
        Box::new(ChannelConfirm::new(answer_rx))
    };
    let input = args.input.input.clone();
    let slot = UploadSlot::new();
    let handle = slot
        .try_start(move |sink, cancel| {
            match SyncEngine::connect(remote, sync_settings, sink.clone(), cancel) {
                Ok(engine) => engine.run(
                    |sink| process::process_file(&input, &options, sink),
                    confirm.as_mut(),
                ),
                Err(err) => {
                    let outcome = SyncOutcome::Failure {
                        reason: err.to_string(),
                    };
                    sink.error(format!("Connection failed: {err}"));
                    sink.emit(SyncEvent::Finished(outcome.clone()));
                    outcome
                }
            }
        })
        .context("Starting upload worker")?
        .ok_or_else(|| anyhow!("An upload is already running"))?;

    install_interrupt_handler(handle.cancel_token());

    let mut prompt_open = false;
    for event in handle.events.iter() {
        match &event {
            SyncEvent::ConfirmationRequested(summary) if !args.yes => {
                prompt_open = true;
                let asked = show_prompt(summary).and_then(|()| read_answer(answer_tx.clone()));
                if let Err(err) = asked {
                    warn!("Could not read confirmation: {err}");
                    // The worker may have timed out already; a closed channel is fine.
                    let _ = answer_tx.send(false);
                }
            }
            SyncEvent::State(state) if prompt_open => {
                prompt_open = false;
                if *state == SyncState::Cancelled {
                    println!();
                    println!("Confirmation closed; the upload was not started");
                }
            }
            other => crate::report_progress(other),
        }
    }

    match handle
        .join()
        .map_err(|_| anyhow!("upload worker panicked"))?
    {
        SyncOutcome::Success { rows_uploaded } => {
            settings.last_synced_at = Some(Utc::now());
            println!("Uploaded {rows_uploaded} rows");
            Ok(())
        }
        SyncOutcome::Cancelled => {
            println!("Upload cancelled");
            Ok(())
        }
        SyncOutcome::Failure { reason } => Err(anyhow!("Upload failed: {reason}")),
    }
}

/// Ctrl-C cancels the running upload at its next checkpoint instead of
/// killing the process mid-batch.
fn install_interrupt_handler(cancel: CancelToken) {
    let installed = ctrlc::set_handler(move || {
        eprintln!("Interrupt received; stopping after the current request...");
        cancel.cancel();
    });
    if let Err(err) = installed {
        warn!("Could not install the interrupt handler: {err}");
    }
}

fn show_prompt(summary: &UploadSummary) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{summary}")?;
    writeln!(stdout)?;
    write!(stdout, "This operation cannot be undone. Proceed? [y/N] ")?;
    stdout.flush()
}

/// Reads the answer on a helper thread; the event loop keeps draining
/// while the prompt is open.
fn read_answer(answers: mpsc::Sender<bool>) -> io::Result<()> {
    thread::Builder::new()
        .name("stock-sync-confirm".to_string())
        .spawn(move || {
            let mut line = String::new();
            let answer = match io::stdin().lock().read_line(&mut line) {
                Ok(_) => is_affirmative(&line),
                Err(err) => {
                    warn!("Could not read confirmation: {err}");
                    false
                }
            };
            let _ = answers.send(answer);
        })?;
    Ok(())
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
