use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use minesweeper_common::{
    models::{BoardView, User},
    protocol::{ClickData, NewGame, NewUser},
};
use nanoid::nanoid;
use rand::Rng;
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{Entity, Error, Result},
    logic::{Click, Game, GameParams, Rules},
    store::{Store, StoreError},
};

const GAME_ID_LENGTH: usize = 12;

fn game_key(name: &str) -> String {
    format!("game:{name}")
}

/// Usernames are stored trimmed, so every lookup trims too.
fn user_key(username: &str) -> String {
    format!("user:{}", username.trim())
}

/// Users and games on top of a [`Store`].
///
/// Every read-modify-write of a game happens under a per-name lock, so two
/// requests for the same game cannot overwrite each other's move.
pub struct GameService {
    store: Arc<dyn Store>,
    rules: Rules,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl GameService {
    pub fn new(store: Arc<dyn Store>, rules: Rules) -> Self {
        Self {
            store,
            rules,
            locks: DashMap::new(),
        }
    }

    #[instrument(level = "trace", skip(self))]
    pub fn create_user(&self, new_user: NewUser) -> Result<User> {
        let username = new_user.username.trim();
        if username.is_empty() {
            return Err(Error::InvalidUsername);
        }

        let key = user_key(username);
        if self.store.exists(&key)? {
            debug!("User {} already exists", username);
            return Err(Error::UserExists);
        }

        let user = User {
            username: username.to_string(),
            created_at: Utc::now(),
        };
        self.save(&key, &user)?;
        info!("Created user {}", user.username);
        Ok(user)
    }

    pub async fn create_game(&self, request: NewGame) -> Result<Game> {
        let game = self.new_game_with(request, &mut rand::rng())?;
        self.insert_game(game).await
    }

    /// Builds a game for an existing user without storing it.
    #[instrument(level = "trace", skip(self, rng))]
    pub fn new_game_with<R: Rng + ?Sized>(&self, request: NewGame, rng: &mut R) -> Result<Game> {
        self.ensure_exists(&user_key(&request.username), Entity::User)?;

        let name = match request.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => nanoid!(GAME_ID_LENGTH),
        };
        let params = GameParams::normalized(request.rows, request.cols, request.mines);
        let username = request.username.trim().to_string();

        Ok(Game::new(name, username, params, rng, Utc::now()))
    }

    /// Stores a new game, refusing to replace one with the same name.
    #[instrument(level = "trace", skip(self, game), fields(game = %game.name))]
    pub async fn insert_game(&self, game: Game) -> Result<Game> {
        let lock = self.lock_for(&game.name);
        let _guard = lock.lock().await;

        let key = game_key(&game.name);
        if self.store.exists(&key)? {
            warn!("Game name {} is already taken", game.name);
            return Err(Error::GameExists);
        }
        self.save(&key, &game)?;

        info!("Stored game {} for user {}", game.name, game.username);
        Ok(game)
    }

    #[instrument(level = "trace", skip(self, data), fields(row = data.row, col = data.col, kind = %data.kind))]
    pub async fn click(&self, game_name: &str, username: &str, data: &ClickData) -> Result<Game> {
        let key = game_key(game_name);
        self.ensure_exists(&key, Entity::Game)?;
        self.ensure_exists(&user_key(username), Entity::User)?;

        let lock = self.lock_for(game_name);
        let _guard = lock.lock().await;

        let mut game = self.load_game(&key)?.ok_or(Error::NotFound(Entity::Game))?;
        info!(
            "Click type [{}] request at ({}, {}) for game [{}] with status [{}]",
            data.kind, data.row, data.col, game.name, game.status
        );

        let click = Click::try_from(data)?;
        let outcome = game.apply(&click, &self.rules, Utc::now())?;
        debug!("Applied {:?}, game is now {}", outcome, game.status);

        self.save(&key, &game)?;
        Ok(game)
    }

    pub fn game(&self, game_name: &str, username: &str) -> Result<Game> {
        let key = game_key(game_name);
        self.ensure_exists(&key, Entity::Game)?;
        self.ensure_exists(&user_key(username), Entity::User)?;

        self.load_game(&key)?.ok_or(Error::NotFound(Entity::Game))
    }

    pub fn board(&self, game_name: &str, username: &str) -> Result<BoardView> {
        Ok(self.game(game_name, username)?.board.view())
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn delete_game(&self, game_name: &str, username: &str) -> Result<()> {
        let key = game_key(game_name);
        self.ensure_exists(&key, Entity::Game)?;
        self.ensure_exists(&user_key(username), Entity::User)?;

        let lock = self.lock_for(game_name);
        let _guard = lock.lock().await;

        // The lock entry stays: another task may still hold a clone of it.
        if !self.store.delete(&key)? {
            return Err(Error::NotFound(Entity::Game));
        }

        info!("Deleted game {}", game_name);
        Ok(())
    }

    fn lock_for(&self, game_name: &str) -> Arc<Mutex<()>> {
        self.locks.entry(game_name.to_string()).or_default().clone()
    }

    fn ensure_exists(&self, key: &str, entity: Entity) -> Result<()> {
        if self.store.exists(key)? {
            Ok(())
        } else {
            debug!("No {} stored under {}", entity, key);
            Err(Error::NotFound(entity))
        }
    }

    fn load_game(&self, key: &str) -> Result<Option<Game>> {
        let Some(game) = self.load::<Game>(key)? else {
            return Ok(None);
        };
        game.check_board().map_err(|e| StoreError::Decode {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(game))
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(bytes) = self.store.get(key)? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes).map_err(|e| StoreError::Decode {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(value))
    }

    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(StoreError::Encode)?;
        self.store.put(key, bytes)?;
        Ok(())
    }
}
