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

//! Generation bookkeeping for on-disk evaluator checkpoints, ported from
//! `original_source/generic/model.h`'s `ModelCollection`: a base directory
//! holding a `current/` symlink-or-directory plus numbered generation
//! directories `0/`, `1/`, ...

use std::path::{Path, PathBuf};

use dg_utils::Error;

/// Scans a base directory for the generation-numbered subdirectories a
/// promotion/evaluation loop would maintain (out of scope here per the
/// spec's Non-goals, but the directory layout itself is this crate's
/// concern so callers have somewhere to checkpoint to).
pub struct ModelCollection {
    base_dir: PathBuf,
}

impl ModelCollection {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        ModelCollection { base_dir: base_dir.into() }
    }

    /// The smallest generation number with no corresponding directory --
    /// i.e. the total number of generations checkpointed so far, matching
    /// `ModelCollection::CountNumGens`'s `for (int g = 0;; ++g)` scan.
    pub fn count_generations(&self) -> usize {
        let mut gen = 0usize;
        while self.gen_checkpoint_dir(gen).is_dir() {
            gen += 1;
        }
        gen
    }

    pub fn current_checkpoint_dir(&self) -> PathBuf {
        self.base_dir.join("current")
    }

    /// The `current/` checkpoint directory, if one has actually been
    /// written yet -- `Error::MissingCheckpoint` otherwise, e.g. when
    /// resuming self-play or evaluation before any model has ever been
    /// checkpointed.
    pub fn require_current_checkpoint_dir(&self) -> Result<PathBuf, Error> {
        let dir = self.current_checkpoint_dir();
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(Error::MissingCheckpoint(dir.display().to_string()))
        }
    }

    pub fn gen_checkpoint_dir(&self, gen: usize) -> PathBuf {
        self.base_dir.join(gen.to_string())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn counts_consecutive_generation_directories() {
        let dir = std::env::temp_dir().join(format!("dg_eval_test_{}", std::process::id()));
        fs::create_dir_all(dir.join("0")).unwrap();
        fs::create_dir_all(dir.join("1")).unwrap();
        // gap at 2 -- 3 must not count.
        fs::create_dir_all(dir.join("3")).unwrap();

        let collection = ModelCollection::new(&dir);
        assert_eq!(collection.count_generations(), 2);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn empty_base_dir_has_zero_generations() {
        let collection = ModelCollection::new("/nonexistent/dg_eval_test_path");
        assert_eq!(collection.count_generations(), 0);
    }

    #[test]
    fn current_checkpoint_dir_is_base_slash_current() {
        let collection = ModelCollection::new("/tmp/models");
        assert_eq!(collection.current_checkpoint_dir(), Path::new("/tmp/models/current"));
    }

    #[test]
    fn require_current_checkpoint_dir_fails_when_nothing_was_ever_checkpointed() {
        let collection = ModelCollection::new("/nonexistent/dg_eval_test_path");
        assert!(collection.require_current_checkpoint_dir().is_err());
    }

    #[test]
    fn require_current_checkpoint_dir_succeeds_once_current_exists() {
        let dir = std::env::temp_dir().join(format!("dg_eval_test_require_{}", std::process::id()));
        fs::create_dir_all(dir.join("current")).unwrap();

        let collection = ModelCollection::new(&dir);
        assert_eq!(collection.require_current_checkpoint_dir().unwrap(), dir.join("current"));

        fs::remove_dir_all(&dir).unwrap();
    }
}
