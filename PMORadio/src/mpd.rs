//! Adaptateur MPD pour le lecteur
//!
//! Chaque commande ouvre une connexion TCP au démon MPD, lit la bannière
//! `OK MPD x.y.z`, envoie la commande et lit la réponse jusqu'à `OK` ou
//! `ACK ...`.

use async_trait::async_trait;
use pmoradiobrowser::{Player, PlayerError, PlayerStatus};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Lecteur piloté par le protocole MPD
#[derive(Debug, Clone)]
pub struct MpdPlayer {
    address: String,
    timeout: Duration,
}

impl MpdPlayer {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            address: format!("{host}:{port}"),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Envoie une commande, retourne les paires `clé: valeur` de la réponse
    async fn command(&self, name: &str, line: &str) -> Result<Vec<(String, String)>, PlayerError> {
        timeout(self.timeout, self.exchange(name, line))
            .await
            .map_err(|_| PlayerError::Unavailable(format!("{} timed out", self.address)))?
    }

    async fn exchange(&self, name: &str, line: &str) -> Result<Vec<(String, String)>, PlayerError> {
        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| PlayerError::Unavailable(format!("{}: {}", self.address, e)))?;
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        let unavailable = |e: std::io::Error| PlayerError::Unavailable(e.to_string());

        match lines.next_line().await.map_err(unavailable)? {
            Some(banner) if banner.starts_with("OK MPD") => {}
            other => {
                return Err(PlayerError::Unavailable(format!(
                    "unexpected banner: {:?}",
                    other
                )));
            }
        }

        debug!("MPD > {}", line);
        write
            .write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(unavailable)?;

        let mut pairs = Vec::new();
        while let Some(reply) = lines.next_line().await.map_err(unavailable)? {
            if reply == "OK" {
                return Ok(pairs);
            }
            if let Some(error) = reply.strip_prefix("ACK ") {
                return Err(PlayerError::command(name, error));
            }
            if let Some((key, value)) = reply.split_once(": ") {
                pairs.push((key.to_string(), value.to_string()));
            }
        }

        Err(PlayerError::command(name, "connection closed"))
    }
}

/// Argument entre guillemets, `"` et `\` échappés
fn quote(arg: &str) -> String {
    let escaped = arg.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[async_trait]
impl Player for MpdPlayer {
    async fn clear(&self) -> Result<(), PlayerError> {
        self.command("clear", "clear").await.map(|_| ())
    }

    async fn add(&self, url: &str) -> Result<(), PlayerError> {
        self.command("add", &format!("add {}", quote(url)))
            .await
            .map(|_| ())
    }

    async fn play(&self) -> Result<(), PlayerError> {
        self.command("play", "play").await.map(|_| ())
    }

    async fn stop(&self) -> Result<(), PlayerError> {
        self.command("stop", "stop").await.map(|_| ())
    }

    async fn status(&self) -> Result<PlayerStatus, PlayerError> {
        let status = self.command("status", "status").await?;
        let song = self.command("currentsong", "currentsong").await?;

        Ok(PlayerStatus {
            playing: value(&status, "state") == Some("play"),
            current_url: value(&song, "file").map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Faux démon : répond `reply` à chaque connexion et renvoie les commandes reçues
    async fn fake_mpd(reply: &'static str, connections: usize) -> (u16, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let mut received = Vec::new();
            for _ in 0..connections {
                let (mut socket, _) = listener.accept().await.unwrap();
                socket.write_all(b"OK MPD 0.23.5\n").await.unwrap();
                let mut buf = [0u8; 512];
                let n = socket.read(&mut buf).await.unwrap();
                received.push(String::from_utf8_lossy(&buf[..n]).trim_end().to_string());
                socket.write_all(reply.as_bytes()).await.unwrap();
            }
            received
        });

        (port, handle)
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("http://a/b"), "\"http://a/b\"");
        assert_eq!(quote("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }

    #[tokio::test]
    async fn test_add_sends_quoted_url() {
        let (port, server) = fake_mpd("OK\n", 1).await;
        let player = MpdPlayer::new("127.0.0.1", port);

        player.add("http://stream.example/jazz").await.unwrap();

        assert_eq!(server.await.unwrap(), ["add \"http://stream.example/jazz\""]);
    }

    #[tokio::test]
    async fn test_ack_is_a_command_error() {
        let (port, _server) = fake_mpd("ACK [50@0] {play} No such song\n", 1).await;
        let player = MpdPlayer::new("127.0.0.1", port);

        let err = player.play().await.unwrap_err();
        assert_eq!(err, PlayerError::command("play", "[50@0] {play} No such song"));
    }

    #[tokio::test]
    async fn test_stop() {
        let (port, server) = fake_mpd("OK\n", 1).await;
        let player = MpdPlayer::new("127.0.0.1", port);

        player.stop().await.unwrap();

        assert_eq!(server.await.unwrap(), ["stop"]);
    }

    #[tokio::test]
    async fn test_status_reads_state_and_file() {
        let (port, _server) = fake_mpd("state: play\nfile: http://stream.example/jazz\nOK\n", 2).await;
        let player = MpdPlayer::new("127.0.0.1", port);

        let status = player.status().await.unwrap();
        assert!(status.playing);
        assert_eq!(status.current_url.as_deref(), Some("http://stream.example/jazz"));
    }

    #[tokio::test]
    async fn test_unreachable_daemon() {
        let player = MpdPlayer::new("127.0.0.1", 1).with_timeout(Duration::from_secs(1));
        assert!(matches!(player.clear().await, Err(PlayerError::Unavailable(_))));
    }
}
