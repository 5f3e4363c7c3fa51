//! sqs commands - send, receive and delete queue messages

use ak_aws::SqsClient;
use ak_core::{CancellationToken, DeletionToken, Message, MessageQueue, ReceiveOptions};
use clap::{Args, Subcommand};
use serde::Serialize;

use super::consume::{self, ConsumeArgs};
use super::{ConnectionArgs, client_config};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Subcommand, Debug)]
pub enum SqsCommands {
    /// Send one message
    Send(SendArgs),

    /// Receive up to --max messages, waiting up to --wait seconds
    Receive(ReceiveArgs),

    /// Delete a received message by its deletion token
    Delete(DeleteArgs),

    /// Receive, print and delete messages until interrupted
    Consume(ConsumeArgs),
}

impl SqsCommands {
    fn queue(&self) -> &str {
        match self {
            SqsCommands::Send(args) => &args.queue,
            SqsCommands::Receive(args) => &args.queue,
            SqsCommands::Delete(args) => &args.queue,
            SqsCommands::Consume(args) => &args.queue,
        }
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Queue name
    pub queue: String,

    /// Message body
    pub body: String,
}

#[derive(Args, Debug)]
pub struct ReceiveArgs {
    /// Queue name
    pub queue: String,

    /// Maximum number of messages (1-10)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(i32).range(1..=10))]
    pub max: i32,

    /// Long-poll wait in seconds (0-20)
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(i32).range(0..=20))]
    pub wait: i32,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Queue name
    pub queue: String,

    /// Deletion token printed by `receive`
    pub token: String,
}

#[derive(Debug, Serialize)]
struct SendOutput<'a> {
    queue: &'a str,
    message_id: String,
}

#[derive(Debug, Serialize)]
struct ReceiveOutput<'a> {
    queue: &'a str,
    messages: &'a [Message],
}

/// Execute an sqs subcommand
pub async fn execute(
    cmd: SqsCommands,
    conn: &ConnectionArgs,
    output_config: OutputConfig,
    cancel: &CancellationToken,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let config = match client_config(conn, cmd.queue()) {
        Ok(c) => c,
        Err(e) => return formatter.fail("Failed to resolve connection settings", &e),
    };

    let client = match SqsClient::new(config, cancel).await {
        Ok(c) => c,
        Err(e) => return formatter.fail("Failed to open queue", &e),
    };

    match cmd {
        SqsCommands::Send(args) => send(&client, args, &formatter, cancel).await,
        SqsCommands::Receive(args) => receive(&client, args, &formatter, cancel).await,
        SqsCommands::Delete(args) => delete(&client, args, &formatter, cancel).await,
        SqsCommands::Consume(args) => consume::execute(&client, args, &formatter, cancel).await,
    }
}

async fn send(
    queue: &dyn MessageQueue,
    args: SendArgs,
    formatter: &Formatter,
    cancel: &CancellationToken,
) -> ExitCode {
    match queue.send(&args.body, cancel).await {
        Ok(message_id) => {
            if formatter.is_json() {
                formatter.json(&SendOutput {
                    queue: queue.queue_name(),
                    message_id,
                });
            } else {
                formatter.success(&format!("Sent message {message_id}"));
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail("Failed to send message", &e),
    }
}

async fn receive(
    queue: &dyn MessageQueue,
    args: ReceiveArgs,
    formatter: &Formatter,
    cancel: &CancellationToken,
) -> ExitCode {
    let options = match ReceiveOptions::new(args.max, args.wait) {
        Ok(o) => o,
        Err(e) => return formatter.fail("Invalid receive options", &e),
    };

    let messages = match queue.receive(options, cancel).await {
        Ok(m) => m,
        Err(e) => return formatter.fail("Failed to receive messages", &e),
    };

    if formatter.is_json() {
        formatter.json(&ReceiveOutput {
            queue: queue.queue_name(),
            messages: &messages,
        });
    } else if messages.is_empty() {
        formatter.println("No messages.");
    } else {
        for message in &messages {
            print_message(formatter, message);
        }
    }
    ExitCode::Success
}

async fn delete(
    queue: &dyn MessageQueue,
    args: DeleteArgs,
    formatter: &Formatter,
    cancel: &CancellationToken,
) -> ExitCode {
    let token = DeletionToken::new(args.token);
    match queue.delete(&token, cancel).await {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&serde_json::json!({
                    "queue": queue.queue_name(),
                    "deleted": true,
                }));
            } else {
                formatter.success("Message deleted");
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail("Failed to delete message", &e),
    }
}

/// Human-readable rendering of one message
pub(super) fn print_message(formatter: &Formatter, message: &Message) {
    formatter.println(&format!("Message {}", message.id));
    formatter.println(&format!("  token: {}", message.deletion_token.as_str()));
    formatter.println(&format!("  body:  {}", message.body));
}
