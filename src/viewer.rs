//! A thin, non-ANSI terminal client for the control endpoint.
//!
//! Grounded on `examples/original_source/viewer.c`'s `print_boards_all`
//! wire exchange (send `b`, read the reply) with the full-screen ANSI
//! redraw loop deliberately left out -- that rendering layer is out of
//! CORE scope per spec section 1.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

/// One `"<i>,<moveno>,<score>,<board_hex16>"` line from a `b` reply.
pub struct BoardLine {
    pub index: u32,
    pub moveno: u32,
    pub score: u32,
    pub board_hex: String,
}

/// Send `b` over the control endpoint and read back one board dump.
pub fn fetch_boards(socket_path: &Path) -> Result<Vec<BoardLine>> {
    let stream = UnixStream::connect(socket_path)
        .with_context(|| format!("connecting to control endpoint {}", socket_path.display()))?;
    let mut writer = stream.try_clone().context("cloning control stream")?;
    writer.write_all(b"b").context("sending board-dump command")?;

    let mut reader = BufReader::new(stream);
    let mut header = String::new();
    reader.read_line(&mut header).context("reading board-dump header")?;
    let count: usize = header.trim().parse().context("parsing board-dump count")?;

    let mut lines = Vec::with_capacity(count);
    for _ in 0..count {
        let mut line = String::new();
        reader.read_line(&mut line).context("reading board-dump line")?;
        lines.push(parse_board_line(line.trim_end())?);
    }
    Ok(lines)
}

fn parse_board_line(line: &str) -> Result<BoardLine> {
    let mut fields = line.splitn(4, ',');
    let mut next = || fields.next().with_context(|| format!("malformed board-dump line: {line}"));
    let index: u32 = next()?.parse().context("parsing worker index")?;
    let moveno: u32 = next()?.parse().context("parsing moveno")?;
    let score: u32 = next()?.parse().context("parsing score")?;
    let board_hex = next()?.to_string();
    Ok(BoardLine { index, moveno, score, board_hex })
}

/// Render one board dump to `out`, one worker per line, plain text.
pub fn print_boards(lines: &[BoardLine]) {
    for line in lines {
        println!(
            "worker {:>2}  move {:<6} score {:<8} board {}",
            line.index, line.moveno, line.score, line.board_hex
        );
    }
}

/// Poll the control endpoint and print a fresh board dump every tick,
/// until the process is interrupted or a fetch fails (the daemon stopped).
pub fn run(socket_path: &Path, tick: Duration) -> Result<()> {
    loop {
        let boards = fetch_boards(socket_path)?;
        print_boards(&boards);
        println!();
        std::thread::sleep(tick);
    }
}

/// Send the `q` command once, asking the daemon to shut down.
pub fn send_quit(socket_path: &Path) -> Result<()> {
    let mut stream = UnixStream::connect(socket_path)
        .with_context(|| format!("connecting to control endpoint {}", socket_path.display()))?;
    stream.write_all(b"q").context("sending quit command")?;
    Ok(())
}
