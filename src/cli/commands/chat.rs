//! Interactive question session over the live items.

use crate::cli::{App, Output};
use crate::config::Settings;
use crate::content::ContentId;
use anyhow::Result;
use console::style;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// Exchanges kept for `:history`.
const MAX_CHAT_HISTORY: usize = 20;

/// A line typed at the chat prompt.
#[derive(Debug, PartialEq)]
enum ChatCommand<'a> {
    Load(&'a str),
    Use(&'a str),
    Items,
    History,
    Clear,
    Help,
    Exit,
    Question(&'a str),
    Unknown(&'a str),
}

fn parse_command(line: &str) -> ChatCommand<'_> {
    let line = line.trim();
    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        return ChatCommand::Exit;
    }

    let Some(rest) = line.strip_prefix(':') else {
        return ChatCommand::Question(line);
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match (name, arg.is_empty()) {
        ("load", false) => ChatCommand::Load(arg),
        ("use", false) => ChatCommand::Use(arg),
        ("items", _) => ChatCommand::Items,
        ("history", _) => ChatCommand::History,
        ("clear", _) => ChatCommand::Clear,
        ("help", _) => ChatCommand::Help,
        ("exit" | "quit", _) => ChatCommand::Exit,
        _ => ChatCommand::Unknown(line),
    }
}

/// Bounded record of question/answer exchanges.
#[derive(Debug, Default)]
struct ChatHistory {
    exchanges: VecDeque<(String, String)>,
}

impl ChatHistory {
    fn push(&mut self, question: &str, answer: &str) {
        self.exchanges.push_back((question.to_string(), answer.to_string()));
        while self.exchanges.len() > MAX_CHAT_HISTORY {
            self.exchanges.pop_front();
        }
    }

    fn clear(&mut self) {
        self.exchanges.clear();
    }

    fn len(&self) -> usize {
        self.exchanges.len()
    }

    fn iter(&self) -> impl Iterator<Item = &(String, String)> {
        self.exchanges.iter()
    }
}

/// Run the interactive chat command.
pub async fn run_chat(input: Option<&str>, settings: Settings) -> Result<()> {
    let app = App::new(settings)?;
    let mut current: Option<ContentId> = None;
    let mut history = ChatHistory::default();

    println!("\n{}", style("Earshot Chat").bold().cyan());
    println!(
        "{}\n",
        style("Ask questions about the current item. Type ':help' for commands, 'exit' to quit.").dim()
    );

    if let Some(input) = input {
        load(&app, input, &mut current).await;
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        let prompt = current.as_ref().map(|id| id.as_str()).unwrap_or("no item");
        print!("{} {} ", style(format!("[{}]", prompt)).dim(), style("You:").green().bold());
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        match parse_command(&line) {
            ChatCommand::Question("") => continue,
            ChatCommand::Exit => {
                Output::info("Goodbye!");
                break;
            }
            ChatCommand::Load(input) => load(&app, input, &mut current).await,
            ChatCommand::Use(id) => {
                let id = ContentId::new(id);
                match app.registry().get(&id) {
                    Some(item) => {
                        Output::info(&format!("Now asking about '{}'", item.title()));
                        current = Some(id);
                    }
                    None => Output::warning(&format!("{} is not loaded. Use :load <input>.", id)),
                }
            }
            ChatCommand::Items => {
                let items = app.registry().items();
                if items.is_empty() {
                    Output::info("No items loaded.");
                }
                for item in items {
                    let marker = if current.as_ref() == Some(item.id()) { "*" } else { " " };
                    println!(
                        "  {} {} ({}, {} chunks)",
                        style(marker).cyan(),
                        style(item.title()).bold(),
                        style(item.id()).dim(),
                        item.index().len()
                    );
                }
            }
            ChatCommand::History => {
                for (question, answer) in history.iter() {
                    println!("{} {}", style("You:").green().bold(), question);
                    println!("{} {}\n", style("Earshot:").cyan().bold(), answer);
                }
            }
            ChatCommand::Clear => {
                history.clear();
                Output::info("Conversation history cleared.");
            }
            ChatCommand::Help => print_help(),
            ChatCommand::Unknown(line) => {
                Output::warning(&format!("Unknown command: {}", line));
                print_help();
            }
            ChatCommand::Question(question) => {
                let Some(id) = current.clone() else {
                    Output::warning("Load something first with :load <url or path>.");
                    continue;
                };

                let spinner = Output::spinner("Thinking...");
                let result = app.engine().ask(&id, question).await;
                spinner.finish_and_clear();

                match result {
                    Ok(answer) => {
                        println!("\n{} {}\n", style("Earshot:").cyan().bold(), answer.text);
                        for source in &answer.sources {
                            println!(
                                "  {} chunk {} @ {}",
                                style(format!("[{}]", source.rank)).dim(),
                                source.sequence,
                                source.timestamp.as_deref().unwrap_or("--:--")
                            );
                        }
                        history.push(question, &answer.text);
                    }
                    Err(e) => Output::error(&format!("Error: {}", e)),
                }
            }
        }
    }

    Ok(())
}

async fn load(app: &App, input: &str, current: &mut Option<ContentId>) {
    match app.load(input).await {
        Ok((source, item)) => {
            Output::success(&format!("Loaded '{}' ({} chunks)", item.title(), item.index().len()));
            *current = Some(source.id);
        }
        Err(e) => Output::error(&format!("Failed to load {}: {}", input, e)),
    }
}

fn print_help() {
    Output::list_item(":load <input>  load a YouTube URL/ID or media file and ask about it");
    Output::list_item(":use <id>      switch to another loaded item");
    Output::list_item(":items         list loaded items, most recent first");
    Output::list_item(":history       show recent questions and answers");
    Output::list_item(":clear         clear the history");
    Output::list_item("exit           leave the session");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(":load  dQw4w9WgXcQ \n"), ChatCommand::Load("dQw4w9WgXcQ"));
        assert_eq!(parse_command(":use local_abc"), ChatCommand::Use("local_abc"));
        assert_eq!(parse_command(":items"), ChatCommand::Items);
        assert_eq!(parse_command("quit"), ChatCommand::Exit);
        assert_eq!(parse_command(" what is said? "), ChatCommand::Question("what is said?"));
        assert_eq!(parse_command(":load"), ChatCommand::Unknown(":load"));
        assert_eq!(parse_command(":dance"), ChatCommand::Unknown(":dance"));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = ChatHistory::default();
        for i in 0..MAX_CHAT_HISTORY + 5 {
            history.push(&format!("q{}", i), "a");
        }
        assert_eq!(history.len(), MAX_CHAT_HISTORY);
        assert_eq!(history.iter().next().map(|(q, _)| q.as_str()), Some("q5"));

        history.clear();
        assert_eq!(history.len(), 0);
    }
}
