// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::error::Error;

/// Defines the families of sketches whose binary images this crate reads.
///
/// A family defines a set of sketches that share fundamental algorithms and behaviors. The
/// members of a family may still differ by how they are stored and accessed.
pub(crate) struct Family {
    /// The byte ID for this family.
    pub id: u8,
    /// The name for this family.
    pub name: &'static str,
    /// The minimum preamble size for this family in ints (4-bytes integer).
    pub min_pre_ints: u8,
    /// The maximum preamble size for this family in ints (4-bytes integer).
    pub max_pre_ints: u8,
}

impl Family {
    /// KLL quantiles sketch.
    pub const KLL: Family = Family {
        id: 15,
        name: "KLL",
        min_pre_ints: 2,
        max_pre_ints: 5,
    };
}

impl Family {
    pub fn validate_id(&self, family_id: u8) -> Result<(), Error> {
        if family_id != self.id {
            Err(Error::invalid_family(self.id, family_id, self.name))
        } else {
            Ok(())
        }
    }

    pub fn validate_pre_ints(&self, pre_ints: u8) -> Result<(), Error> {
        if (self.min_pre_ints..=self.max_pre_ints).contains(&pre_ints) {
            Ok(())
        } else {
            Err(Error::invalid_preamble_ints(self.max_pre_ints, pre_ints))
        }
    }
}
