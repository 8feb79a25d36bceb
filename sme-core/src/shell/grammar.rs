#![allow(clippy::module_name_repetitions)]

//! Parser for the diagnostic shell.
//!
//! Shell lines are short and bounded, so the grammar composes `winnow`
//! combinators directly over the input line; no token buffer is needed.

use core::fmt;

use winnow::Parser;
use winnow::ascii::{Caseless, dec_uint, space0, space1};
use winnow::combinator::{alt, cut_err, delimited, opt, preceded};
use winnow::error::{ContextError, ErrMode};
use winnow::token::{literal, take_while};

type GrammarResult<T> = Result<T, ErrMode<ContextError>>;

/// Hardware-mode patterns the shell can request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HwModePattern {
    /// Single MAC, single band.
    Smm,
    /// Dual band simultaneous.
    Dbs,
    /// Single band simultaneous.
    Sbs,
}

impl HwModePattern {
    /// Firmware hardware-mode table index for this pattern.
    #[must_use]
    pub const fn hw_mode_index(self) -> u32 {
        match self {
            HwModePattern::Smm => 0,
            HwModePattern::Dbs => 1,
            HwModePattern::Sbs => 2,
        }
    }
}

impl fmt::Display for HwModePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HwModePattern::Smm => "smm",
            HwModePattern::Dbs => "dbs",
            HwModePattern::Sbs => "sbs",
        };
        f.write_str(name)
    }
}

/// Structured commands produced by the parser.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ShellCommand<'a> {
    HwMode(HwModePattern),
    DualMac {
        scan_config: u32,
        fw_mode_config: u32,
    },
    Antenna {
        tx_chains: u32,
        rx_chains: u32,
    },
    Nss {
        nss: u8,
        session: u8,
    },
    Status,
    Help {
        topic: Option<&'a str>,
    },
}

/// Parse failure with the byte offset where the line stopped making sense.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ShellParseError {
    pub offset: usize,
}

impl fmt::Display for ShellParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error at column {}", self.offset)
    }
}

/// Parse a shell command from the provided line.
pub fn parse(line: &str) -> Result<ShellCommand<'_>, ShellParseError> {
    command
        .parse(line.trim_ascii_end())
        .map_err(|err| ShellParseError {
            offset: err.offset(),
        })
}

fn command<'a>(input: &mut &'a str) -> GrammarResult<ShellCommand<'a>> {
    delimited(
        space0,
        alt((hwmode, dualmac, antenna, nss, status, help)),
        space0,
    )
    .parse_next(input)
}

fn hwmode<'a>(input: &mut &'a str) -> GrammarResult<ShellCommand<'a>> {
    preceded(
        (literal(Caseless("hwmode")), space1),
        cut_err(alt((
            literal(Caseless("dbs")).value(HwModePattern::Dbs),
            literal(Caseless("smm")).value(HwModePattern::Smm),
            literal(Caseless("sbs")).value(HwModePattern::Sbs),
        ))),
    )
    .map(ShellCommand::HwMode)
    .parse_next(input)
}

fn dualmac<'a>(input: &mut &'a str) -> GrammarResult<ShellCommand<'a>> {
    preceded(
        (literal(Caseless("dualmac")), space1),
        cut_err((dec_uint, space1, dec_uint)),
    )
    .map(|(scan_config, _, fw_mode_config)| ShellCommand::DualMac {
        scan_config,
        fw_mode_config,
    })
    .parse_next(input)
}

fn antenna<'a>(input: &mut &'a str) -> GrammarResult<ShellCommand<'a>> {
    preceded(
        (literal(Caseless("antenna")), space1),
        cut_err((dec_uint, space1, dec_uint)),
    )
    .map(|(tx_chains, _, rx_chains)| ShellCommand::Antenna {
        tx_chains,
        rx_chains,
    })
    .parse_next(input)
}

fn nss<'a>(input: &mut &'a str) -> GrammarResult<ShellCommand<'a>> {
    preceded(
        (literal(Caseless("nss")), space1),
        cut_err((
            dec_uint::<_, u8, _>.verify(|value| (1..=2).contains(value)),
            space1,
            dec_uint,
        )),
    )
    .map(|(nss, _, session)| ShellCommand::Nss { nss, session })
    .parse_next(input)
}

fn status<'a>(input: &mut &'a str) -> GrammarResult<ShellCommand<'a>> {
    literal(Caseless("status"))
        .value(ShellCommand::Status)
        .parse_next(input)
}

fn help<'a>(input: &mut &'a str) -> GrammarResult<ShellCommand<'a>> {
    preceded(literal(Caseless("help")), opt(preceded(space1, topic)))
        .map(|topic| ShellCommand::Help { topic })
        .parse_next(input)
}

fn topic<'a>(input: &mut &'a str) -> GrammarResult<&'a str> {
    take_while(1.., |ch: char| ch.is_ascii_alphanumeric() || ch == '-').parse_next(input)
}
