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

use thiserror::Error;

/// Failures that abort decoding of an entire file.
///
/// Everything below the file level is best effort and is reported through
/// [`crate::MeshReport`] instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NdmError {
    #[error("buffer of {length} bytes is shorter than the {minimum} byte file header")]
    TooShort { length: usize, minimum: usize },

    #[error("node index {index} is out of range for a model with {count} nodes")]
    NodeOutOfRange { index: usize, count: usize },
}
