//! Command router: turns one inbound chat message into the replies it causes.
//!
//! Routing is synchronous. Every store access finishes before `route`
//! returns, so replies are only enqueued once the store lock is released.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use hangman_rust_core::dictionary::Dictionary;
use hangman_rust_core::error::HangmanError;
use hangman_rust_core::game::{parse_guess, GameSession, GuessOutcome, StopOutcome};
use hangman_rust_core::models::{
    BotIdentity, InboundMessage, OutboundMessage, UserId, COMMAND_PREFIX,
};
use hangman_rust_core::shutdown::{ShutdownCoordinator, ShutdownReason};
use hangman_rust_core::store::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Id,
    Hi,
    Start,
    Stop,
    Ping,
    Pong,
    Stats,
    Shutdown,
    Help,
}

impl Command {
    /// Unknown names fall back to `Help`.
    fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "id" => Command::Id,
            "hi" => Command::Hi,
            "start" => Command::Start,
            "stop" => Command::Stop,
            "ping" => Command::Ping,
            "pong" => Command::Pong,
            "stats" => Command::Stats,
            "shutdown" => Command::Shutdown,
            _ => Command::Help,
        }
    }
}

/// Parse the command in `text`. Returns `None` when the command carries an
/// `@target` that is not this bot.
pub fn parse_command(text: &str, me: &BotIdentity) -> Option<Command> {
    let head = text.split_whitespace().next().unwrap_or_default();
    let head = head.strip_prefix(COMMAND_PREFIX).unwrap_or(head);

    let name = match head.split_once('@') {
        Some((name, target)) => {
            if !me.is_addressed_by(target) {
                return None;
            }
            name
        }
        None => head,
    };
    Some(Command::from_name(name))
}

pub const HELP_TEXT: &str = "You can play Hangman with this bot. Try it out using /start!";

pub struct CommandRouter {
    store: Arc<SessionStore>,
    dictionary: Arc<dyn Dictionary>,
    me: BotIdentity,
    admins: Vec<UserId>,
    shutdown: ShutdownCoordinator,
}

impl CommandRouter {
    pub fn new(
        store: Arc<SessionStore>,
        dictionary: Arc<dyn Dictionary>,
        me: BotIdentity,
        admins: Vec<UserId>,
        shutdown: ShutdownCoordinator,
    ) -> Self {
        Self {
            store,
            dictionary,
            me,
            admins,
            shutdown,
        }
    }

    fn is_admin(&self, user_id: UserId) -> bool {
        self.admins.contains(&user_id)
    }

    /// Replies for one inbound message, in send order.
    pub fn route(&self, msg: &InboundMessage) -> Vec<OutboundMessage> {
        if msg.is_command() {
            match parse_command(&msg.text, &self.me) {
                Some(command) => self.handle_command(command, msg),
                None => {
                    debug!("Ignoring command for another bot: {}", msg.text);
                    Vec::new()
                }
            }
        } else {
            self.handle_guess(msg).into_iter().collect()
        }
    }

    fn handle_command(&self, command: Command, msg: &InboundMessage) -> Vec<OutboundMessage> {
        debug!("Chat {}: {:?} from {}", msg.chat_id, command, msg.sender.id);
        let reply = match command {
            Command::Id => OutboundMessage::new(
                msg.chat_id,
                format!(
                    "Hi, {}, your Telegram user ID is {}",
                    msg.sender.display_name(),
                    msg.sender.id
                ),
            )
            .reply_to(msg.message_id),
            Command::Hi => OutboundMessage::new(msg.chat_id, "Hi!"),
            Command::Ping => OutboundMessage::new(msg.chat_id, "Pong!"),
            Command::Pong => OutboundMessage::new(msg.chat_id, "Ping!"),
            Command::Start => self.handle_start(msg),
            Command::Stop => self.handle_stop(msg),
            Command::Stats => self.handle_stats(msg),
            Command::Shutdown => self.handle_shutdown(msg),
            Command::Help => OutboundMessage::new(msg.chat_id, HELP_TEXT),
        };
        vec![reply]
    }

    fn handle_start(&self, msg: &InboundMessage) -> OutboundMessage {
        let chat_id = msg.chat_id;
        if self.store.get_active(chat_id).is_some() {
            return OutboundMessage::new(chat_id, "A game is already active!");
        }

        let session = match self.dictionary.pick_word().and_then(GameSession::new) {
            Ok(session) => session,
            Err(e) => {
                error!("Chat {}: cannot start game: {}", chat_id, e);
                return OutboundMessage::new(
                    chat_id,
                    "Could not start a game right now, please try again later.",
                );
            }
        };

        let reply = OutboundMessage::new(
            chat_id,
            format!(
                "A new game has started!\nWord: {}\nLives: {}",
                session.render(),
                session.lives_left()
            ),
        )
        .reply_to(msg.message_id)
        .with_force_reply();
        let word = session.secret_word().to_string();

        // The check above is advisory; start_new re-checks under the write lock.
        match self.store.start_new(chat_id, session) {
            Ok(()) => {
                info!("Chat {}: new game started", chat_id);
                debug!("Chat {}: secret word is {}", chat_id, word);
                reply
            }
            Err(HangmanError::AlreadyActive { .. }) => {
                OutboundMessage::new(chat_id, "A game is already active!")
            }
            Err(e) => {
                error!("Chat {}: cannot start game: {}", chat_id, e);
                OutboundMessage::new(
                    chat_id,
                    "Could not start a game right now, please try again later.",
                )
            }
        }
    }

    fn handle_stop(&self, msg: &InboundMessage) -> OutboundMessage {
        let chat_id = msg.chat_id;
        let result = self.store.mutate_active(chat_id, |session| {
            let (session, outcome) = session.stop();
            let word = session.secret_word().to_string();
            (session, (outcome, word))
        });

        let text = match result {
            Ok((StopOutcome::Stopped, word)) => {
                info!("Chat {}: game stopped", chat_id);
                format!("Game has been stopped, you did not lose. The word was: {}.", word)
            }
            Ok((StopOutcome::Lost, word)) => {
                info!("Chat {}: game stopped late, booked as lost", chat_id);
                format!("You have lost this game. The word was: {}.", word)
            }
            Ok((StopOutcome::NotActive, _)) | Err(_) => {
                "You cannot stop, there is no game active".to_string()
            }
        };
        OutboundMessage::new(chat_id, text)
    }

    fn handle_stats(&self, msg: &InboundMessage) -> OutboundMessage {
        let text = match self.store.chat_stats(msg.chat_id) {
            None => "There are no stats for this chat yet :(".to_string(),
            Some(stats) => format!(
                "Games won: {}\nGames lost: {}\nGames stopped: {}\nGames played: {}",
                stats.won, stats.lost, stats.stopped, stats.played
            ),
        };
        OutboundMessage::new(msg.chat_id, text)
    }

    fn handle_shutdown(&self, msg: &InboundMessage) -> OutboundMessage {
        if !self.is_admin(msg.sender.id) {
            warn!("Chat {}: user {} tried to shut down", msg.chat_id, msg.sender.id);
            return OutboundMessage::new(msg.chat_id, "Only bot admins can do that.");
        }

        self.shutdown.trigger(ShutdownReason::AdminCommand {
            user_id: msg.sender.id,
        });
        OutboundMessage::new(msg.chat_id, "Shutting down...")
    }

    fn handle_guess(&self, msg: &InboundMessage) -> Option<OutboundMessage> {
        if let Some(reply_to) = msg.reply_to {
            if reply_to.from_id != Some(self.me.id) {
                return None;
            }
        }

        let letter = parse_guess(&msg.text).ok()?;

        let chat_id = msg.chat_id;
        let (outcome, session) = match self.store.mutate_active(chat_id, |session| {
            let (session, outcome) = session.record_guess(msg.sender.id, letter);
            (session.clone(), (outcome, session))
        }) {
            Ok(result) => result,
            Err(e) => {
                if !e.is_user_facing() {
                    error!("Chat {}: guess failed: {}", chat_id, e);
                }
                return None;
            }
        };

        let text = match outcome {
            GuessOutcome::Won => {
                info!("Chat {}: game won", chat_id);
                format!(
                    "Congratulations! You won! The word was: {}\nPress /start to play again",
                    session.secret_word()
                )
            }
            GuessOutcome::Correct => format!(
                "Good letter!\nWord:\n{}\nLives: {}",
                session.render(),
                session.lives_left()
            ),
            GuessOutcome::Incorrect => format!(
                "Wrong letter!\nWord:\n{}\nLives: {}",
                session.render(),
                session.lives_left()
            ),
            GuessOutcome::Lost => {
                info!("Chat {}: game lost", chat_id);
                format!(
                    "You lost :(\nThe word was:\n{}\nPress /start to play again",
                    session.secret_word()
                )
            }
            GuessOutcome::Repeated | GuessOutcome::NotActive => return None,
        };

        let reply = OutboundMessage::new(chat_id, text).reply_to(msg.message_id);
        Some(if outcome.ends_game() {
            reply
        } else {
            reply.with_force_reply()
        })
    }
}
