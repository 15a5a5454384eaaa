//! Main event loop: reads commands from stdin and renders component events.

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::events::{Emitter, UiEvent};
use crate::ui::TerminalView;

use super::{AppController, ParsedCommand, available_commands, parse_command};

pub struct App {
    controller: Arc<AppController>,
    events: mpsc::UnboundedReceiver<UiEvent>,
    view: TerminalView<std::io::Stdout>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let (emitter, events) = Emitter::channel();
        let controller = Arc::new(AppController::new(config, emitter)?);
        Ok(Self {
            controller,
            events,
            view: TerminalView::stdout(),
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        tokio::spawn({
            let controller = Arc::clone(&self.controller);
            async move {
                controller.initialize().await;
            }
        });

        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        self.view.prompt()?;

        loop {
            tokio::select! {
                Some(event) = self.events.recv() => {
                    self.view.render(&event)?;
                }
                line = stdin.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    if line.trim().is_empty() {
                        self.view.prompt()?;
                        continue;
                    }
                    match parse_command(&line) {
                        Ok(ParsedCommand::Quit) => break,
                        Ok(ParsedCommand::Help) => self.view.show_help(&available_commands())?,
                        Ok(command) => self.dispatch(command).await,
                        Err(e) => self.view.render(&UiEvent::Notice(e.to_string()))?,
                    }
                    self.view.prompt()?;
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        self.controller.shutdown();
        tracing::info!("Exiting");
        Ok(())
    }

    /// Network commands run as their own tasks so a slow request never
    /// blocks input; the rest complete inline.
    async fn dispatch(&self, command: ParsedCommand) {
        tracing::debug!("Command: {:?}", command);
        if command.is_network() {
            let controller = Arc::clone(&self.controller);
            tokio::spawn(async move { controller.dispatch(command).await });
        } else {
            self.controller.dispatch(command).await;
        }
    }
}
