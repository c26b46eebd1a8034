//! Typed requests and responses for the device command set.
//!
//! Each request variant knows its exact sequence of wire writes and how
//! many reply lines the device sends back, so a session never has to
//! decide either at call time.

use crate::codec::{encode_integer, KeyName, Secret};
use crate::frame::Frame;
use chrono::Utc;
use std::fmt;

/// Command literals understood by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Sync,
    Get,
    Set,
    Del,
    Wipe,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Sync => "sync",
            Command::Get => "get",
            Command::Set => "set",
            Command::Del => "del",
            Command::Wipe => "wipe",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many lines the device sends in reply, and the response built from
/// them.
#[derive(Debug, Clone, Copy)]
pub enum ReplyShape {
    /// Exactly one line.
    Single(fn(String) -> Response),
    /// One line holding a count `n`, then `n` more lines.
    Counted(fn(Vec<String>) -> Response),
}

/// Sets the device clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
}

impl SyncRequest {
    pub fn new(timestamp: i64) -> Self {
        Self { timestamp }
    }

    /// Builds a request carrying the current UTC time.
    pub fn now() -> Self {
        Self::new(Utc::now().timestamp())
    }
}

/// Enumerates the stored keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest;

/// Stores a new key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRequest {
    pub name: KeyName,
    pub secret: Secret,
}

/// Removes the key at a zero-based position in the `get` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub index: u32,
}

/// Factory-resets the device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WipeRequest;

/// A device request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Sync(SyncRequest),
    List(ListRequest),
    Add(AddRequest),
    Delete(DeleteRequest),
    Wipe(WipeRequest),
}

impl Request {
    pub fn command(&self) -> Command {
        match self {
            Request::Sync(_) => Command::Sync,
            Request::List(_) => Command::Get,
            Request::Add(_) => Command::Set,
            Request::Delete(_) => Command::Del,
            Request::Wipe(_) => Command::Wipe,
        }
    }

    /// Returns the writes for this request, in wire order.
    pub fn frames(&self) -> Vec<Frame> {
        let mut frames = vec![Frame::line(self.command().as_str())];
        match self {
            Request::Sync(req) => frames.push(Frame::line(encode_integer(req.timestamp))),
            Request::Add(req) => {
                frames.push(Frame::line(req.name.as_str()));
                frames.push(Frame::Raw(req.secret.as_bytes().to_vec()));
            }
            Request::Delete(req) => frames.push(Frame::line(encode_integer(req.index.into()))),
            Request::List(_) | Request::Wipe(_) => {}
        }
        frames
    }

    pub fn reply_shape(&self) -> ReplyShape {
        match self {
            Request::Sync(_) => ReplyShape::Single(Response::Synced),
            Request::List(_) => ReplyShape::Counted(Response::Keys),
            Request::Add(_) => ReplyShape::Single(Response::Added),
            Request::Delete(_) => ReplyShape::Single(Response::Deleted),
            Request::Wipe(_) => ReplyShape::Single(Response::Wiped),
        }
    }
}

impl From<SyncRequest> for Request {
    fn from(req: SyncRequest) -> Self {
        Request::Sync(req)
    }
}

impl From<ListRequest> for Request {
    fn from(req: ListRequest) -> Self {
        Request::List(req)
    }
}

impl From<AddRequest> for Request {
    fn from(req: AddRequest) -> Self {
        Request::Add(req)
    }
}

impl From<DeleteRequest> for Request {
    fn from(req: DeleteRequest) -> Self {
        Request::Delete(req)
    }
}

impl From<WipeRequest> for Request {
    fn from(req: WipeRequest) -> Self {
        Request::Wipe(req)
    }
}

/// A device reply. Device text is passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Synced(String),
    /// Key descriptions in device order; position `i` is delete index `i`.
    Keys(Vec<String>),
    Added(String),
    Deleted(String),
    Wiped(String),
}

impl Response {
    /// Consumes the response, returning its reply lines.
    pub fn into_lines(self) -> Vec<String> {
        match self {
            Response::Keys(keys) => keys,
            Response::Synced(line)
            | Response::Added(line)
            | Response::Deleted(line)
            | Response::Wiped(line) => vec![line],
        }
    }

    /// Consumes the response, returning its reply lines joined by newlines.
    pub fn into_text(self) -> String {
        self.into_lines().join("\n")
    }
}
