// Copyright 2019 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;

/// Boundary errors -- malformed input handed to the engine from the outside
/// world. Programming errors (illegal moves, broken tree invariants) are
/// not represented here, they `panic!` at the point of detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A FEN string did not describe a valid position.
    InvalidFen(String),

    /// A model directory was missing its `current/` checkpoint.
    MissingCheckpoint(String),

    /// Any other I/O failure while reading or writing an on-disk artifact.
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::InvalidFen(ref s) => write!(fmt, "invalid FEN: {}", s),
            Error::MissingCheckpoint(ref s) => write!(fmt, "missing checkpoint: {}", s),
            Error::Io(ref s) => write!(fmt, "i/o error: {}", s),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err.to_string())
    }
}
