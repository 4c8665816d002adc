use clap::Parser;
use linechat::{
    client::{self, Exit},
    style::style_line,
    ClientArguments,
};
use tokio::{io::AsyncWriteExt, net::TcpStream};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = ClientArguments::parse();

    let stream = match TcpStream::connect((args.host.as_str(), args.port)).await {
        Ok(stream) => stream,
        Err(_) => {
            println!("{}", style_line("[ERR] Error connecting to server."));
            return Ok(());
        }
    };
    let (reader, writer) = stream.into_split();

    let exit = client::run(reader, writer, tokio::io::stdin(), tokio::io::stdout()).await?;
    if exit == Exit::ConnectionLost {
        println!();
        println!(
            "{}",
            style_line("[ERR] Connection to Server lost. Shutting down client.")
        );
    }
    tokio::io::stdout().flush().await?;
    Ok(())
}
