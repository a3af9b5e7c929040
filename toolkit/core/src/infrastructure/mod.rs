// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod delta_parser;
pub mod mail_client;
pub mod message_file;

pub use delta_parser::{DeltaParser, InvalidDelta, ParseRejection, ParseReport, ParsedBlock};
pub use mail_client::HttpMailClient;
pub use message_file::FileMessageSource;
