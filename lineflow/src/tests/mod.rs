// Copyright 2025 the Lineflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

mod test_breaking;
mod test_lines;
mod test_relayout;
pub(crate) mod utils;
