// This file is part of OpenNDM.
//
// OpenNDM is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// OpenNDM is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with OpenNDM.  If not, see <http://www.gnu.org/licenses/>.

use crate::{display_list::Validation, layout::LayoutVariant, node::SetupSizeMode};

/// Knobs for the heuristics. The defaults are what works on the files we have seen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeOptions {
    pub validation: Validation,
    /// Re-run a node's display list leniently when the strict pass produced no faces.
    pub lenient_retry: bool,
    pub setup_size: SetupSizeMode,
    /// Force a layout instead of probing for one.
    pub layout: Option<LayoutVariant>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            validation: Validation::Strict,
            lenient_retry: true,
            setup_size: SetupSizeMode::BaseRelative,
            layout: None,
        }
    }
}
