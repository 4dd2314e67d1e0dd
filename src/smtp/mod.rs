/*
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

pub mod auth;
pub mod client;
pub mod ehlo;
pub mod tls;

use smtp_proto::{Response, Severity};

pub trait AssertReply: Sized {
    fn is_positive_completion(&self) -> bool;
    fn assert_positive_completion(self) -> crate::Result<Self>;
    fn assert_code(self, code: u16) -> crate::Result<Self>;
}

impl AssertReply for Response<String> {
    fn is_positive_completion(&self) -> bool {
        matches!(self.severity(), Severity::PositiveCompletion)
    }

    /// Returns the reply if it is a positive completion (2yz).
    fn assert_positive_completion(self) -> crate::Result<Self> {
        if self.is_positive_completion() {
            Ok(self)
        } else {
            Err(crate::Error::UnexpectedReply(self))
        }
    }

    /// Returns the reply if it carries the exact status code.
    fn assert_code(self, code: u16) -> crate::Result<Self> {
        if self.code == code {
            Ok(self)
        } else {
            Err(crate::Error::UnexpectedReply(self))
        }
    }
}
