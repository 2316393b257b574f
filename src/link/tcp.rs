//! TCP rendition of the link cable: one connected client, one byte per
//! exchange. The original hardware clocked bits over a PIO peripheral; here
//! a socket plays the Game Boy side, which keeps the engine unchanged.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::protocol::engine::TradeEngine;
use crate::types::TradeEvent;

/// Accept link clients forever. Clients are served one at a time; a client
/// that disconnects mid-trade triggers a watchdog reset so the next one
/// starts from IDLE.
pub async fn run_link_server(
    listener: TcpListener,
    engine: Arc<Mutex<TradeEngine>>,
    events_tx: broadcast::Sender<TradeEvent>,
) -> std::io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        info!("link client connected: {peer}");
        if let Err(e) = serve_client(stream, &engine, &events_tx).await {
            warn!("link client {peer} dropped: {e}");
        } else {
            info!("link client {peer} disconnected");
        }
        let mut engine = engine.lock();
        engine.reset();
        for event in engine.take_events() {
            let _ = events_tx.send(event);
        }
    }
}

async fn serve_client(
    mut stream: TcpStream,
    engine: &Mutex<TradeEngine>,
    events_tx: &broadcast::Sender<TradeEvent>,
) -> std::io::Result<()> {
    let mut buf = [0u8; 1];
    loop {
        match stream.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        }
        let tx = {
            let mut engine = engine.lock();
            let tx = engine.step(buf[0]);
            for event in engine.take_events() {
                let _ = events_tx.send(event);
            }
            tx
        };
        stream.write_all(&[tx]).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::session::TrainerIdentity;
    use crate::storage::SlotTable;

    fn engine() -> Arc<Mutex<TradeEngine>> {
        let mut table = SlotTable::new(8);
        table.seed_demo();
        Arc::new(Mutex::new(TradeEngine::new(
            Box::new(table),
            TrainerIdentity { id: 1, name: "RED".into() },
        )))
    }

    #[tokio::test]
    async fn test_link_server_answers_each_byte() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let engine = engine();
        let (events_tx, _) = broadcast::channel(64);
        tokio::spawn(run_link_server(listener, Arc::clone(&engine), events_tx));

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut reply = [0u8; 1];
        for (rx, expected) in [(0x01u8, 0x02u8), (0x60, 0x60), (0xD0, 0xD0), (0xD4, 0x00)] {
            client.write_all(&[rx]).await.unwrap();
            client.read_exact(&mut reply).await.unwrap();
            assert_eq!(reply[0], expected, "rx {rx:#x}");
        }
    }

    #[tokio::test]
    async fn test_disconnect_mid_trade_resets_engine() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let engine = engine();
        let (events_tx, _) = broadcast::channel(64);
        tokio::spawn(run_link_server(listener, Arc::clone(&engine), events_tx));

        {
            let mut client = TcpStream::connect(addr).await.unwrap();
            let mut reply = [0u8; 1];
            client.write_all(&[0x01]).await.unwrap();
            client.read_exact(&mut reply).await.unwrap();
        } // dropped mid-handshake

        // Reconnect until the server has cycled back to accepting; the first
        // byte of a fresh handshake must again be answered with SLAVE.
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            let Ok(mut client) = TcpStream::connect(addr).await else { continue };
            if client.write_all(&[0x01]).await.is_err() {
                continue;
            }
            let mut reply = [0u8; 1];
            if client.read_exact(&mut reply).await.is_ok() {
                assert_eq!(reply[0], 0x02);
                return;
            }
        }
        panic!("server never served the second client");
    }
}
