//! Entry point of the game server
//!
//! The [`GameManager`] owns every connection and every game of a process.
//! The transport hands it client events and due alarms; it routes them to
//! the right [`Client`] and game, runs every resulting channel delivery to
//! completion, then flushes the buffered messages through the transport.

use std::{collections::HashMap, time::Duration};

use garde::Validate;
use itertools::Itertools;

use crate::{
    ScheduledAlarm,
    channel::{EventChannels, GameEvent, RemovalReason, Subscriber},
    client::{Client, ClientState, LOBBY_EVENTS, SESSION_EVENTS},
    config::Settings,
    error::{Error, Response},
    game_id::GameId,
    history::HistoryStore,
    lobby::GameLobby,
    player::Id,
    protocol::{AnswerToCorrect, ClientEvent, GameState, ServerEvent},
    quiz::{Quiz, QuizStore},
    session::{GameMode, GameSession},
    tunnel::{Outbox, Tunnel},
};

#[derive(Debug, derive_more::From)]
enum Game {
    Lobby(GameLobby),
    Session(Box<GameSession>),
}

impl Game {
    fn channels_mut(&mut self) -> &mut EventChannels {
        match self {
            Self::Lobby(lobby) => &mut lobby.channels,
            Self::Session(session) => session.channels_mut(),
        }
    }

    fn is_removed(&self) -> bool {
        match self {
            Self::Lobby(lobby) => lobby.is_removed(),
            Self::Session(session) => session.core().is_removed(),
        }
    }

    fn remove(&mut self, reason: RemovalReason) {
        match self {
            Self::Lobby(lobby) => lobby.remove(reason),
            Self::Session(session) => session.remove(reason),
        }
    }
}

/// Hosts every connection and game of a process
#[derive(Debug)]
pub struct GameManager<Q: QuizStore, H: HistoryStore> {
    settings: Settings,
    quizzes: Q,
    history: H,
    clients: HashMap<Id, Client>,
    games: HashMap<GameId, Game>,
}

impl<Q: QuizStore, H: HistoryStore> GameManager<Q, H> {
    /// Creates a manager without connections or games
    ///
    /// # Errors
    ///
    /// Returns the validation report if `settings` are out of range.
    pub fn new(settings: Settings, quizzes: Q, history: H) -> Result<Self, garde::Report> {
        settings.validate()?;
        Ok(Self {
            settings,
            quizzes,
            history,
            clients: HashMap::new(),
            games: HashMap::new(),
        })
    }

    /// The history store games are recorded to
    pub fn history(&self) -> &H {
        &self.history
    }

    /// Current state of a connection
    pub fn client_state(&self, id: Id) -> Option<ClientState> {
        self.clients.get(&id).map(Client::state)
    }

    /// Number of lobbies and sessions alive
    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    /// Registers a new connection
    pub fn connect(&mut self, id: Id) {
        self.clients.entry(id).or_insert_with(|| {
            tracing::debug!(client = %id, "client connected");
            Client::new(id)
        });
    }

    /// Forgets a connection, leaving its game first
    pub fn disconnect<T, F, S>(&mut self, id: Id, tunnel_finder: F, schedule: S)
    where
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(ScheduledAlarm, Duration),
    {
        let mut outbox = Outbox::default();
        self.leave(id, &mut outbox);
        if self.clients.remove(&id).is_some() {
            tracing::debug!(client = %id, "client disconnected");
        }
        self.flush(outbox, tunnel_finder, schedule);
    }

    /// Handles an event sent by a connection
    ///
    /// Events the connection may not send in its current state are dropped.
    ///
    /// # Returns
    ///
    /// The acknowledgement to send back for requests that expect one.
    pub fn receive_message<T, F, S>(
        &mut self,
        id: Id,
        event: ClientEvent,
        tunnel_finder: F,
        schedule: S,
    ) -> Option<Response>
    where
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(ScheduledAlarm, Duration),
    {
        let mut outbox = Outbox::default();
        let response = self.handle(id, event, &mut outbox);
        self.flush(outbox, tunnel_finder, schedule);
        response
    }

    /// Handles an alarm previously scheduled by a game
    pub fn receive_alarm<T, F, S>(&mut self, alarm: ScheduledAlarm, tunnel_finder: F, schedule: S)
    where
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(ScheduledAlarm, Duration),
    {
        let mut outbox = Outbox::default();
        if let Some(Game::Session(session)) = self.games.get_mut(&alarm.game) {
            session.receive_alarm(alarm.alarm, &mut outbox);
            self.drain(alarm.game, &mut outbox);
        } else {
            tracing::debug!(game = %alarm.game, kind = ?alarm.alarm, "dropping alarm of a missing game");
        }
        self.flush(outbox, tunnel_finder, schedule);
    }

    fn flush<T, F, S>(&mut self, outbox: Outbox, tunnel_finder: F, schedule: S)
    where
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(ScheduledAlarm, Duration),
    {
        for command in outbox.flush(tunnel_finder, schedule) {
            command.apply(&mut self.history);
        }
    }

    fn handle(&mut self, id: Id, event: ClientEvent, outbox: &mut Outbox) -> Option<Response> {
        let Some(client) = self.clients.get(&id) else {
            tracing::debug!(client = %id, "dropping event of an unknown client");
            return None;
        };
        let kind = event.kind();
        if !client.listens_to(kind) {
            tracing::debug!(client = %id, ?kind, state = ?client.state(), "dropping unexpected event");
            return None;
        }

        match event {
            ClientEvent::JoinGameLobby(code) => Some(self.join(id, &code, outbox).into()),
            ClientEvent::CreateGameLobby(quiz_id) => {
                let quiz = self.quizzes.get_quiz(&quiz_id);
                Some(self.create_lobby(id, GameMode::Normal, quiz, outbox).into())
            }
            ClientEvent::CreateGameRandom => {
                let quiz = self.quizzes.random_quiz();
                Some(self.create_lobby(id, GameMode::Random, quiz, outbox).into())
            }
            ClientEvent::CreateGameTest(quiz_id) => {
                let quiz = self.quizzes.get_quiz(&quiz_id);
                Some(self.create_test(id, quiz, outbox).into())
            }
            ClientEvent::SetUsername(name) => Some(self.set_username(id, &name, outbox).into()),
            ClientEvent::StartGame => Some(self.start_game(id, outbox).into()),
            ClientEvent::ToggleLock => {
                self.with_lobby(id, outbox, |lobby| {
                    lobby.toggle_lock();
                });
                None
            }
            ClientEvent::BanPlayer(name) => {
                self.with_lobby(id, outbox, |lobby| {
                    lobby.ban(&name);
                });
                None
            }
            ClientEvent::NextQuestion => {
                self.with_session(id, outbox, |session, _| session.request_next_question(id));
                None
            }
            ClientEvent::ToggleTimerPause => {
                self.with_session(id, outbox, |session, outbox| {
                    session.toggle_timer_pause(id, outbox);
                });
                None
            }
            ClientEvent::StartTimerPanic => {
                self.with_session(id, outbox, |session, outbox| {
                    session.start_timer_panic(id, outbox);
                });
                None
            }
            ClientEvent::ToggleAnswerChoices(index) => {
                self.with_session(id, outbox, |session, outbox| {
                    session.toggle_answer_choice(id, index, outbox);
                });
                None
            }
            ClientEvent::UpdateAnswerResponse(text) => {
                self.with_session(id, outbox, |session, outbox| {
                    session.update_answer_response(id, &text, outbox);
                });
                None
            }
            ClientEvent::SubmitAnswer => {
                self.with_session(id, outbox, |session, outbox| session.submit_answer(id, outbox));
                None
            }
            ClientEvent::SendAnswersCorrected(grades) => {
                self.correct(id, &grades, outbox);
                None
            }
            ClientEvent::PlayerLeftGame => {
                self.leave(id, outbox);
                None
            }
        }
    }

    fn game_of(&self, id: Id) -> Result<GameId, Error> {
        self.clients
            .get(&id)
            .and_then(|client| client.state().game())
            .ok_or(Error::NotInGame)
    }

    fn load_quiz(quiz: Option<Quiz>) -> Result<Quiz, Error> {
        let quiz = quiz.ok_or(Error::QuizUnavailable)?;
        if let Err(report) = quiz.validate() {
            tracing::warn!(quiz = %quiz.id, %report, "refusing invalid quiz");
            return Err(Error::QuizUnavailable);
        }
        Ok(quiz)
    }

    fn join(&mut self, id: Id, code: &str, outbox: &mut Outbox) -> Result<String, Error> {
        let game_id: GameId = code.parse()?;
        let Some(Game::Lobby(lobby)) = self.games.get_mut(&game_id) else {
            return Err(Error::NoGameFound);
        };
        lobby.check_open()?;
        let client = self.clients.get_mut(&id).ok_or(Error::NotInGame)?;

        client.transition(ClientState::GamePlayer { game: game_id }, None);
        client.subscribe(&mut lobby.channels, &LOBBY_EVENTS);
        outbox.send(id, ServerEvent::SendGameInfo(lobby.info()));
        outbox.send(id, ServerEvent::UpdateGameState(GameState::Lobby));
        Ok(game_id.to_string())
    }

    fn create_lobby(
        &mut self,
        id: Id,
        mode: GameMode,
        quiz: Option<Quiz>,
        outbox: &mut Outbox,
    ) -> Result<String, Error> {
        let quiz = Self::load_quiz(quiz)?;
        let game_id = GameId::unused(|game| self.games.contains_key(game))
            .ok_or(Error::NoGameIdAvailable)?;
        let mut lobby = GameLobby::new(game_id, mode, quiz, id, self.settings.max_players);
        let client = self.clients.get_mut(&id).ok_or(Error::NotInGame)?;

        client.transition(ClientState::GameOrganizer { game: game_id }, None);
        client.subscribe(&mut lobby.channels, &LOBBY_EVENTS);
        outbox.send(id, ServerEvent::SendGameInfo(lobby.info()));
        outbox.send(id, ServerEvent::UpdateGameState(GameState::Lobby));

        tracing::info!(game = %game_id, ?mode, quiz = %lobby.quiz.id, "lobby created");
        self.games.insert(game_id, lobby.into());
        Ok(game_id.to_string())
    }

    fn create_test(
        &mut self,
        id: Id,
        quiz: Option<Quiz>,
        outbox: &mut Outbox,
    ) -> Result<String, Error> {
        let quiz = Self::load_quiz(quiz)?;
        let game_id = GameId::unused(|game| self.games.contains_key(game))
            .ok_or(Error::NoGameIdAvailable)?;
        let mut session = Box::new(GameSession::new_test(game_id, quiz, id, self.settings.clone()));
        let client = self.clients.get_mut(&id).ok_or(Error::NotInGame)?;

        client.transition(ClientState::GamePlayer { game: game_id }, None);
        client.subscribe(session.channels_mut(), &SESSION_EVENTS);
        outbox.send(id, ServerEvent::SendGameInfo(session.core().info()));

        tracing::info!(game = %game_id, quiz = %session.core().quiz.id, "practice game created");
        session.start();
        self.games.insert(game_id, session.into());
        self.drain(game_id, outbox);
        Ok(game_id.to_string())
    }

    fn set_username(&mut self, id: Id, name: &str, outbox: &mut Outbox) -> Result<String, Error> {
        let game_id = self.game_of(id)?;
        let Some(Game::Lobby(lobby)) = self.games.get_mut(&game_id) else {
            return Err(Error::NoGameFound);
        };
        let name = lobby.add_player(id, name)?;
        outbox.send_many(lobby.recipients(), &ServerEvent::SendGameInfo(lobby.info()));
        self.drain(game_id, outbox);
        Ok(name)
    }

    /// Hands a started lobby over to a new session
    ///
    /// Every connection attached to the lobby is re-attached to the session
    /// under its new role; connections that never picked a name are kicked.
    fn start_game(&mut self, id: Id, outbox: &mut Outbox) -> Result<(), Error> {
        let game_id = self.game_of(id)?;
        let mut lobby = match self.games.remove(&game_id) {
            Some(Game::Lobby(lobby)) if lobby.organizer == id && lobby.can_start() => lobby,
            Some(game) => {
                let error = match &game {
                    Game::Lobby(_) => Error::CannotStart,
                    Game::Session(_) => Error::NoGameFound,
                };
                self.games.insert(game_id, game);
                return Err(error);
            }
            None => return Err(Error::NoGameFound),
        };

        lobby.start();
        let mut attached = Vec::new();
        while let Some((subscriber, event)) = lobby.channels.next_delivery() {
            if let (Subscriber::Client(client), GameEvent::GameStarted) = (subscriber, event) {
                attached.push(client);
            }
        }
        for client in &attached {
            if let Some(client) = self.clients.get_mut(client) {
                client.clear_state(Some(&mut lobby.channels));
            }
        }

        let mode = lobby.mode;
        let organizer = lobby.organizer;
        let players = lobby.roster.iter().map(|p| p.id).collect_vec();
        let mut session = Box::new(GameSession::from_lobby(lobby, self.settings.clone()));

        for client_id in attached {
            let Some(client) = self.clients.get_mut(&client_id) else {
                continue;
            };
            let state = if client_id == organizer && mode == GameMode::Normal {
                ClientState::GameOrganizer { game: game_id }
            } else if client_id == organizer || players.contains(&client_id) {
                ClientState::GamePlayer { game: game_id }
            } else {
                outbox.send(
                    client_id,
                    ServerEvent::KickedOutFromGame(
                        RemovalReason::GameAlreadyStarted.message().to_owned(),
                    ),
                );
                client.enter(ClientState::Default);
                continue;
            };
            client.enter(state);
            client.subscribe(session.channels_mut(), &SESSION_EVENTS);
        }
        session.core().send_all(&ServerEvent::SendGameInfo(session.core().info()), outbox);

        tracing::info!(game = %game_id, ?mode, players = players.len(), "game started");
        session.start();
        self.games.insert(game_id, session.into());
        self.drain(game_id, outbox);
        Ok(())
    }

    fn correct(&mut self, id: Id, grades: &[AnswerToCorrect], outbox: &mut Outbox) {
        self.with_session(id, outbox, |session, outbox| {
            session.send_answers_corrected(id, grades, outbox);
        });
    }

    /// Runs an organizer action on its lobby, then refreshes everyone's view
    fn with_lobby<F>(&mut self, id: Id, outbox: &mut Outbox, action: F)
    where
        F: FnOnce(&mut GameLobby),
    {
        let Ok(game_id) = self.game_of(id) else {
            return;
        };
        match self.games.get_mut(&game_id) {
            Some(Game::Lobby(lobby)) if lobby.organizer == id => {
                action(lobby);
                outbox.send_many(lobby.recipients(), &ServerEvent::SendGameInfo(lobby.info()));
            }
            _ => {
                tracing::debug!(client = %id, game = %game_id, "not the organizer of a lobby");
                return;
            }
        }
        self.drain(game_id, outbox);
    }

    fn with_session<F>(&mut self, id: Id, outbox: &mut Outbox, action: F)
    where
        F: FnOnce(&mut GameSession, &mut Outbox),
    {
        let Ok(game_id) = self.game_of(id) else {
            return;
        };
        let Some(Game::Session(session)) = self.games.get_mut(&game_id) else {
            tracing::debug!(client = %id, game = %game_id, "no session to act on");
            return;
        };
        action(session, outbox);
        self.drain(game_id, outbox);
    }

    /// Detaches a connection from its game
    ///
    /// An organizer leaving closes the game, unless the quiz is already over.
    fn leave(&mut self, id: Id, outbox: &mut Outbox) {
        let Some(client) = self.clients.get_mut(&id) else {
            return;
        };
        let Some(game_id) = client.state().game() else {
            return;
        };
        let Some(game) = self.games.get_mut(&game_id) else {
            client.transition(ClientState::Default, None);
            return;
        };

        client.transition(ClientState::Default, Some(game.channels_mut()));
        outbox.send(id, ServerEvent::PlayerRemovedFromGame(String::new()));

        match game {
            Game::Lobby(lobby) if lobby.organizer == id => lobby.remove(RemovalReason::OrganizerLeft),
            Game::Lobby(lobby) => {
                if lobby.remove_player(id, RemovalReason::Left).is_some() {
                    outbox.send_many(lobby.recipients(), &ServerEvent::SendGameInfo(lobby.info()));
                }
            }
            Game::Session(session)
                if session.core().organizer == Some(id) && !session.core().quiz_ended =>
            {
                session.remove(RemovalReason::OrganizerLeft);
            }
            Game::Session(session) => session.remove_player(id, RemovalReason::Left),
        }
        self.drain(game_id, outbox);
    }

    /// Delivers every pending channel event of a game
    ///
    /// A game nobody is attached to anymore is removed, and a removed game is
    /// dropped once its last event is delivered.
    fn drain(&mut self, game_id: GameId, outbox: &mut Outbox) {
        let Some(game) = self.games.get_mut(&game_id) else {
            return;
        };
        loop {
            while let Some((subscriber, event)) = game.channels_mut().next_delivery() {
                match (subscriber, &mut *game) {
                    (Subscriber::Client(id), game) => {
                        if let Some(client) = self.clients.get_mut(&id) {
                            client.on_game_event(&event, game.channels_mut(), outbox);
                        }
                    }
                    (subscriber, Game::Session(session)) => {
                        session.deliver(subscriber, &event, outbox);
                    }
                    (subscriber, Game::Lobby(_)) => {
                        tracing::debug!(?subscriber, "lobby event without observer");
                    }
                }
            }
            if game.is_removed() || game.channels_mut().client_count() > 0 {
                break;
            }
            game.remove(RemovalReason::Abandoned);
        }
        if game.is_removed() {
            tracing::info!(game = %game_id, "game dropped");
            self.games.remove(&game_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Alarm,
        game_id,
        history::HistoryEntry,
        protocol::PlayerInfo,
        quiz::tests::{qcm, qrl, quiz},
        testing::{self, MockTunnel},
    };

    #[derive(Debug, Default)]
    struct Recorder {
        calls: Vec<&'static str>,
    }

    impl HistoryStore for Recorder {
        fn register_to_history(&mut self, _game: GameId, _entry: &HistoryEntry) {
            self.calls.push("register");
        }

        fn save_game_to_history(&mut self, _game: GameId, _entry: HistoryEntry) {
            self.calls.push("save");
        }

        fn unregister_from_history(&mut self, _game: GameId) {
            self.calls.push("unregister");
        }
    }

    struct Harness {
        manager: GameManager<HashMap<String, Quiz>, Recorder>,
        tunnel: MockTunnel,
        alarms: Vec<ScheduledAlarm>,
    }

    impl Harness {
        fn new() -> Self {
            testing::init_tracing();
            let quizzes = HashMap::from([
                (
                    "two".to_owned(),
                    quiz(vec![qcm("1", 10, &[0], 2), qcm("2", 10, &[1], 2)]),
                ),
                ("one".to_owned(), quiz(vec![qcm("1", 10, &[0], 2)])),
                ("open".to_owned(), quiz(vec![qrl("1", 20)])),
            ]);
            Self {
                manager: GameManager::new(Settings::default(), quizzes, Recorder::default())
                    .unwrap(),
                tunnel: MockTunnel::default(),
                alarms: Vec::new(),
            }
        }

        fn connect(&mut self) -> Id {
            let id = Id::new();
            self.manager.connect(id);
            id
        }

        fn send(&mut self, id: Id, event: ClientEvent) -> Option<Response> {
            let tunnel = self.tunnel.clone();
            let alarms = &mut self.alarms;
            self.manager.receive_message(
                id,
                event,
                |to| Some(tunnel.for_id(to)),
                |alarm, _| alarms.push(alarm),
            )
        }

        fn disconnect(&mut self, id: Id) {
            let tunnel = self.tunnel.clone();
            let alarms = &mut self.alarms;
            self.manager
                .disconnect(id, |to| Some(tunnel.for_id(to)), |alarm, _| alarms.push(alarm));
        }

        /// Delivers due alarms matching `filter` until none is left
        fn fire(&mut self, filter: impl Fn(&Alarm) -> bool) {
            while let Some(position) = self.alarms.iter().position(|a| filter(&a.alarm)) {
                let alarm = self.alarms.remove(position);
                let tunnel = self.tunnel.clone();
                let alarms = &mut self.alarms;
                self.manager.receive_alarm(
                    alarm,
                    |to| Some(tunnel.for_id(to)),
                    |alarm, _| alarms.push(alarm),
                );
            }
        }

        fn take(&self, id: Id) -> Vec<ServerEvent> {
            self.tunnel.take(id)
        }

        fn state(&self, id: Id) -> ClientState {
            self.manager.client_state(id).unwrap()
        }

        fn create(&mut self, quiz_id: &str) -> (Id, String) {
            let organizer = self.connect();
            let response = self
                .send(organizer, ClientEvent::CreateGameLobby(quiz_id.to_owned()))
                .unwrap();
            assert!(response.success);
            (organizer, response.message.unwrap())
        }

        fn join(&mut self, code: &str, name: &str) -> Id {
            let id = self.connect();
            assert!(self.send(id, ClientEvent::JoinGameLobby(code.to_owned())).unwrap().success);
            assert!(self.send(id, ClientEvent::SetUsername(name.to_owned())).unwrap().success);
            id
        }

        fn start(&mut self, organizer: Id) {
            self.send(organizer, ClientEvent::ToggleLock);
            assert_eq!(self.send(organizer, ClientEvent::StartGame), Some(Response::ok()));
        }
    }

    fn last_score(events: &[ServerEvent]) -> Option<f64> {
        events.iter().rev().find_map(|e| match e {
            ServerEvent::SendPlayerScore(PlayerInfo { score, .. }) => Some(*score),
            _ => None,
        })
    }

    #[test]
    fn test_two_players_lobby_scenario() {
        let mut h = Harness::new();
        let (organizer, code) = h.create("two");
        let a = h.join(&code, "A");
        let b = h.join(&code, "B");
        assert!(h.take(organizer).contains(&ServerEvent::SendPlayerJoined("B".to_owned())));
        assert!(h.take(a).contains(&ServerEvent::SendPlayerJoined("B".to_owned())));

        h.start(organizer);
        assert_eq!(h.state(organizer), ClientState::GameOrganizer { game: code.parse().unwrap() });
        assert_eq!(h.state(a), ClientState::GamePlayer { game: code.parse().unwrap() });
        assert!(h.take(a).iter().any(|e| matches!(e, ServerEvent::QuestionData(_))));
        h.take(organizer);

        h.send(a, ClientEvent::ToggleAnswerChoices(0));
        h.send(a, ClientEvent::SubmitAnswer);
        assert!(!h.take(organizer).contains(&ServerEvent::CanGoToNextQuestion(true)));

        h.send(b, ClientEvent::ToggleAnswerChoices(1));
        h.send(b, ClientEvent::SubmitAnswer);
        assert!(h.take(organizer).contains(&ServerEvent::CanGoToNextQuestion(true)));

        let (a_events, b_events) = (h.take(a), h.take(b));
        assert!(a_events.contains(&ServerEvent::AnswerCollected));
        assert!((last_score(&a_events).unwrap() - 12.).abs() < f64::EPSILON);
        assert!(last_score(&b_events).unwrap().abs() < f64::EPSILON);

        h.send(organizer, ClientEvent::NextQuestion);
        assert!(h.take(b).iter().any(|e| matches!(e, ServerEvent::QuestionData(_))));
    }

    #[test]
    fn test_organizer_disconnect_kicks_everyone() {
        let mut h = Harness::new();
        let (organizer, code) = h.create("two");
        let a = h.join(&code, "A");
        let b = h.join(&code, "B");
        h.start(organizer);
        h.send(a, ClientEvent::SubmitAnswer);
        h.take(a);
        h.take(b);

        h.disconnect(organizer);

        let kick = ServerEvent::KickedOutFromGame(RemovalReason::OrganizerLeft.message().to_owned());
        for player in [a, b] {
            assert_eq!(h.take(player), vec![kick.clone()]);
            assert_eq!(h.state(player), ClientState::Default);
        }
        assert_eq!(h.manager.game_count(), 0);
        assert_eq!(h.manager.history().calls, ["register", "unregister"]);
        assert!(h.manager.client_state(organizer).is_none());
    }

    #[test]
    fn test_organizer_leaving_lobby_closes_it() {
        let mut h = Harness::new();
        let (organizer, code) = h.create("two");
        let a = h.join(&code, "A");
        h.take(organizer);
        h.take(a);

        h.send(organizer, ClientEvent::PlayerLeftGame);

        assert_eq!(h.take(organizer), vec![ServerEvent::PlayerRemovedFromGame(String::new())]);
        assert_eq!(
            h.take(a),
            vec![ServerEvent::KickedOutFromGame(
                RemovalReason::OrganizerLeft.message().to_owned()
            )]
        );
        assert_eq!(h.manager.game_count(), 0);
        assert!(h.manager.history().calls.is_empty());
    }

    #[test]
    fn test_events_outside_state_are_dropped() {
        let mut h = Harness::new();
        let stranger = h.connect();
        assert_eq!(h.send(stranger, ClientEvent::SubmitAnswer), None);
        assert_eq!(h.send(stranger, ClientEvent::StartGame), None);
        assert!(h.take(stranger).is_empty());

        let (organizer, code) = h.create("two");
        let a = h.join(&code, "A");
        h.send(a, ClientEvent::ToggleLock);
        assert_eq!(h.send(a, ClientEvent::StartGame), None);
        assert_eq!(h.send(organizer, ClientEvent::JoinGameLobby(code.clone())), None);
        assert_eq!(h.state(organizer), ClientState::GameOrganizer { game: code.parse().unwrap() });

        let late = h.connect();
        assert!(h.send(late, ClientEvent::JoinGameLobby(code)).unwrap().success);
    }

    #[test]
    fn test_join_errors() {
        let mut h = Harness::new();
        let id = h.connect();
        let join = |h: &mut Harness, code: &str| h.send(id, ClientEvent::JoinGameLobby(code.to_owned()));

        assert_eq!(
            join(&mut h, "12a4"),
            Some(Response::failure(game_id::Error::InvalidFormat.into()))
        );
        assert_eq!(
            join(&mut h, "42"),
            Some(Response::failure(game_id::Error::OutOfRange.into()))
        );
        assert_eq!(join(&mut h, "5555"), Some(Response::failure(Error::NoGameFound)));

        let (organizer, code) = h.create("two");
        h.send(organizer, ClientEvent::ToggleLock);
        assert_eq!(join(&mut h, &code), Some(Response::failure(Error::GameLocked)));
        assert_eq!(h.state(id), ClientState::Default);
    }

    #[test]
    fn test_unknown_and_invalid_quizzes() {
        let mut h = Harness::new();
        let id = h.connect();
        assert_eq!(
            h.send(id, ClientEvent::CreateGameLobby("missing".to_owned())),
            Some(Response::failure(Error::QuizUnavailable))
        );

        let mut broken = quiz(vec![qcm("1", 15, &[0], 2)]);
        broken.id = "broken".to_owned();
        h.manager.quizzes.insert("broken".to_owned(), broken);
        assert_eq!(
            h.send(id, ClientEvent::CreateGameTest("broken".to_owned())),
            Some(Response::failure(Error::QuizUnavailable))
        );
        assert_eq!(h.state(id), ClientState::Default);
        assert_eq!(h.manager.game_count(), 0);
    }

    #[test]
    fn test_start_requires_lock() {
        let mut h = Harness::new();
        let (organizer, code) = h.create("two");
        h.join(&code, "A");

        assert_eq!(
            h.send(organizer, ClientEvent::StartGame),
            Some(Response::failure(Error::CannotStart))
        );
        assert_eq!(h.manager.game_count(), 1);
    }

    #[test]
    fn test_nameless_joiner_is_kicked_at_start() {
        let mut h = Harness::new();
        let (organizer, code) = h.create("two");
        h.join(&code, "A");
        let lurker = h.connect();
        h.send(lurker, ClientEvent::JoinGameLobby(code));
        h.take(lurker);

        h.start(organizer);

        assert_eq!(
            h.take(lurker),
            vec![ServerEvent::KickedOutFromGame(
                RemovalReason::GameAlreadyStarted.message().to_owned()
            )]
        );
        assert_eq!(h.state(lurker), ClientState::Default);
        assert!(h.manager.clients[&lurker].listens_to(crate::protocol::ClientEventKind::JoinGameLobby));
    }

    #[test]
    fn test_ban_kicks_player() {
        let mut h = Harness::new();
        let (organizer, code) = h.create("two");
        let mallory = h.join(&code, "Mallory");
        h.take(mallory);

        h.send(organizer, ClientEvent::BanPlayer("mallory".to_owned()));

        assert_eq!(
            h.take(mallory),
            vec![ServerEvent::KickedOutFromGame(
                RemovalReason::Banned.message().to_owned()
            )]
        );
        assert_eq!(h.state(mallory), ClientState::Default);
        assert!(h.take(organizer).contains(&ServerEvent::SendPlayerLeft("Mallory".to_owned())));

        let again = h.connect();
        h.send(again, ClientEvent::JoinGameLobby(code));
        assert!(!h.send(again, ClientEvent::SetUsername("MALLORY".to_owned())).unwrap().success);
    }

    #[test]
    fn test_random_game_organizer_plays() {
        let mut h = Harness::new();
        let organizer = h.connect();
        let response = h.send(organizer, ClientEvent::CreateGameRandom).unwrap();
        assert!(response.success);
        let game: GameId = response.message.unwrap().parse().unwrap();

        h.start(organizer);

        assert_eq!(h.state(organizer), ClientState::GamePlayer { game });
        assert!(h.take(organizer).iter().any(|e| matches!(e, ServerEvent::QuestionData(_))));
        assert!(h.manager.clients[&organizer].listens_to(crate::protocol::ClientEventKind::SubmitAnswer));
    }

    #[test]
    fn test_practice_game_advances_alone() {
        let mut h = Harness::new();
        let solo = h.connect();
        let response = h.send(solo, ClientEvent::CreateGameTest("two".to_owned())).unwrap();
        assert!(response.success);
        assert!(matches!(h.state(solo), ClientState::GamePlayer { .. }));
        assert!(h.take(solo).iter().any(|e| matches!(e, ServerEvent::QuestionData(_))));

        h.send(solo, ClientEvent::ToggleAnswerChoices(0));
        h.send(solo, ClientEvent::SubmitAnswer);
        assert!((last_score(&h.take(solo)).unwrap() - 12.).abs() < f64::EPSILON);

        h.fire(|a| matches!(a, Alarm::AdvanceQuestion { .. }));
        assert!(h.take(solo).iter().any(|e| matches!(e, ServerEvent::QuestionData(_))));

        h.send(solo, ClientEvent::PlayerLeftGame);
        assert_eq!(h.take(solo), vec![ServerEvent::PlayerRemovedFromGame(String::new())]);
        assert_eq!(h.manager.game_count(), 0);
        assert!(h.manager.history().calls.is_empty());
    }

    #[test]
    fn test_countdown_closes_question() {
        let mut h = Harness::new();
        let (organizer, code) = h.create("two");
        let a = h.join(&code, "A");
        h.start(organizer);
        h.take(a);

        h.fire(|a| matches!(a, Alarm::TimerTick { .. }));

        let events = h.take(a);
        assert!(events.contains(&ServerEvent::TimerValue(0)));
        assert!(events.contains(&ServerEvent::SendCorrectAnswer(vec![0])));
        assert!(h.take(organizer).contains(&ServerEvent::CanGoToNextQuestion(true)));
    }

    #[test]
    fn test_alarm_of_removed_game_is_ignored() {
        let mut h = Harness::new();
        let (organizer, code) = h.create("two");
        let a = h.join(&code, "A");
        h.start(organizer);
        h.disconnect(organizer);
        h.take(a);

        h.fire(|_| true);
        assert!(h.take(a).is_empty());
    }

    #[test]
    fn test_finished_game_is_saved_then_dropped() {
        let mut h = Harness::new();
        let (organizer, code) = h.create("one");
        let a = h.join(&code, "A");
        h.start(organizer);
        h.send(a, ClientEvent::ToggleAnswerChoices(0));
        h.send(a, ClientEvent::SubmitAnswer);
        h.send(organizer, ClientEvent::NextQuestion);

        let game = code.parse().unwrap();
        assert_eq!(h.state(organizer), ClientState::GameLeaderboard { game });
        assert_eq!(h.state(a), ClientState::GameLeaderboard { game });
        assert!(h.take(a).contains(&ServerEvent::UpdateGameState(GameState::Leaderboard)));
        assert_eq!(h.manager.history().calls, ["register", "save"]);

        h.send(a, ClientEvent::PlayerLeftGame);
        assert!(h.take(organizer).contains(&ServerEvent::SendPlayerLeft("A".to_owned())));
        assert_eq!(h.manager.game_count(), 1);

        h.send(organizer, ClientEvent::PlayerLeftGame);
        assert_eq!(h.manager.game_count(), 0);
        assert_eq!(h.manager.history().calls, ["register", "save"]);
    }

    #[test]
    fn test_qrl_correction_through_manager() {
        let mut h = Harness::new();
        let (organizer, code) = h.create("open");
        let a = h.join(&code, "A");
        h.start(organizer);

        h.send(a, ClientEvent::UpdateAnswerResponse("my essay".to_owned()));
        h.send(a, ClientEvent::SubmitAnswer);
        let to_correct = h
            .take(organizer)
            .into_iter()
            .find_map(|e| match e {
                ServerEvent::SendAnswerToCorrect(list) => Some(list),
                _ => None,
            })
            .unwrap();
        assert_eq!(to_correct[0].answer, "my essay");

        let grades = vec![AnswerToCorrect {
            score: 1.,
            ..to_correct[0].clone()
        }];
        h.send(a, ClientEvent::SendAnswersCorrected(grades.clone()));
        assert!(!h.take(organizer).contains(&ServerEvent::CanGoToNextQuestion(true)));

        h.send(organizer, ClientEvent::SendAnswersCorrected(grades));
        assert!(h.take(organizer).contains(&ServerEvent::CanGoToNextQuestion(true)));
        assert!((last_score(&h.take(a)).unwrap() - 20.).abs() < f64::EPSILON);
    }
}
