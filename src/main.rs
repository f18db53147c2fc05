use std::io;
use std::rc::Rc;

use anyhow::Context;
use clap::Parser as _;
use smol::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use smol::net::{SocketAddr, TcpListener};
use smol::LocalExecutor;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod bstr;
mod implementation;
mod interface;
mod parser;
mod wrapper;

use implementation::catalog::Catalog;
use implementation::stack::SessionOptions;
use interface::database::Connection;
use interface::types::Reply;
use parser::Parser;
use wrapper::ControllerWrapper;

/// A RESP server that keeps a stack of visited databases for every client.
#[derive(clap::Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// address to listen on
    #[clap(short, long, env = "DBSTACK_BIND", default_value = "127.0.0.1:7379")]
    bind: SocketAddr,

    /// database every new session starts on
    #[clap(long, default_value = "test")]
    initial_db: String,

    /// start sessions with the stack disabled, so `use` only switches
    #[clap(long)]
    stack_off: bool,

    /// only print the stack when asked for it with `dbs`
    #[clap(long)]
    silent: bool,

    /// Print debug information
    #[clap(long)]
    debug: bool,
}

impl Cli {
    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            initial_db: self.initial_db.clone(),
            enabled: !self.stack_off,
            silent: self.silent,
        }
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn handle_stream<S>(mut stream: S, addr: SocketAddr, controller: ControllerWrapper) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handle = match controller.connect(addr) {
        Ok(handle) => handle,
        Err(e) => {
            warn!(%addr, error = %e, "unable to start session");
            stream
                .write_all(&Reply::error(e.to_string()).to_bytes_vec())
                .await?;
            return Ok(());
        }
    };
    let id = handle.id().clone();
    info!(
        session = %id,
        %addr,
        live = controller.borrow().session_count(),
        "client connected"
    );

    let mut buffer = [0; 1024];
    let mut parser = Parser::new();

    loop {
        let n = stream.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        parser.extend(&buffer[..n]);

        loop {
            match parser.parse() {
                Ok(Some(request)) => {
                    let reply = handle.execute(request);
                    stream.write_all(&reply).await?;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(session = %id, error = %e, "protocol error");
                    stream
                        .write_all(&Reply::error(format!("Protocol error: {e}")).to_bytes_vec())
                        .await?;
                    parser.clear();
                    break;
                }
            }
        }
    }

    drop(handle);
    info!(
        session = %id,
        live = controller.borrow().session_count(),
        "client disconnected"
    );
    Ok(())
}

async fn serve(
    ex: &LocalExecutor<'_>,
    addr: SocketAddr,
    controller: ControllerWrapper,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("unable to listen on {addr}"))?;
    info!(%addr, "listening");

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let controller = controller.clone();
                ex.spawn(async move {
                    if let Err(e) = handle_stream(stream, peer, controller).await {
                        warn!(%peer, error = %e, "error serving client");
                    }
                })
                .detach();
            }
            Err(e) => warn!(error = %e, "error accepting client"),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let catalog = Rc::new(Catalog::default());
    catalog
        .get_db(&cli.initial_db)
        .with_context(|| format!("invalid --initial-db {:?}", cli.initial_db))?;
    let controller = ControllerWrapper::new(catalog, cli.session_options());

    let ex = LocalExecutor::new();
    smol::block_on(ex.run(serve(&ex, cli.bind, controller)))
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use super::*;

    struct MockStream {
        input: io::Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl MockStream {
        fn new(input: &[u8]) -> Self {
            Self {
                input: io::Cursor::new(input.to_vec()),
                output: Vec::new(),
            }
        }
    }

    impl AsyncRead for MockStream {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut [u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(io::Read::read(&mut self.input, buf))
        }
    }

    impl AsyncWrite for MockStream {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            self.output.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 6000))
    }

    fn run(controller: &ControllerWrapper, input: &[u8]) -> Vec<u8> {
        let mut stream = MockStream::new(input);
        smol::block_on(handle_stream(&mut stream, addr(), controller.clone())).unwrap();
        stream.output
    }

    #[test]
    fn test_session_over_stream() {
        let controller =
            ControllerWrapper::new(Rc::new(Catalog::default()), SessionOptions::default());
        let output = run(
            &controller,
            b"pushdb admin\r\n*1\r\n$6\r\npushdb\r\nuse \r\npopdb\r\ndb\r\n",
        );
        assert_eq!(
            output,
            b"+[>admin<,test]\r\n+[>test<,admin]\r\n-ERR bad use parameter\r\n+[>admin<]\r\n$5\r\nadmin\r\n"
        );
        assert_eq!(controller.borrow().session_count(), 0);
    }

    #[test]
    fn test_stack_is_per_session() {
        let controller =
            ControllerWrapper::new(Rc::new(Catalog::default()), SessionOptions::default());
        run(&controller, b"pushdb admin\n");
        assert_eq!(run(&controller, b"dbs\n"), b"+[>test<]\r\n");
        assert_eq!(
            run(&controller, b"dblist\n"),
            b"*2\r\n$5\r\nadmin\r\n$4\r\ntest\r\n"
        );
    }

    #[test]
    fn test_protocol_error_discards_buffer() {
        let controller =
            ControllerWrapper::new(Rc::new(Catalog::default()), SessionOptions::default());
        assert_eq!(
            run(&controller, b"*1\r\n:x\r\nping\r\n"),
            b"-ERR Protocol error: expected '$', got ':'\r\n"
        );
    }

    #[test]
    fn test_rejected_initial_db() {
        let options = SessionOptions {
            initial_db: "bad name".to_string(),
            ..Default::default()
        };
        let controller = ControllerWrapper::new(Rc::new(Catalog::default()), options);
        assert_eq!(
            run(&controller, b"dbs\n"),
            b"-ERR database name \"bad name\" contains invalid character ' '\r\n"
        );
    }
}
