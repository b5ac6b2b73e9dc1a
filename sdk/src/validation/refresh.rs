// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
};

use futures::future::{BoxFuture, FutureExt, Shared};
use log::debug;

type InFlight<T> = Option<(u64, Shared<BoxFuture<'static, T>>)>;

/// Coalesces concurrent receipt refresh requests.
///
/// The first caller starts a refresh. Callers that arrive while it is
/// outstanding await the same refresh and receive a clone of its result.
/// Once it completes the slot is cleared and the next caller starts a new
/// one.
pub struct RefreshCoordinator<T: Clone + Send + Sync + 'static> {
    in_flight: Mutex<InFlight<T>>,
    next_id: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> RefreshCoordinator<T> {
    /// Create a coordinator with no refresh outstanding.
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    /// Join the outstanding refresh, or start one with `start`.
    ///
    /// `start` is only called when no refresh is outstanding.
    pub async fn refresh<F, Fut>(&self, start: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (id, refresh) = {
            let mut slot = self.lock();
            match slot.as_ref() {
                Some((id, refresh)) => {
                    debug!("joining receipt refresh {id}");
                    (*id, refresh.clone())
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    debug!("starting receipt refresh {id}");
                    let refresh = start().boxed().shared();
                    *slot = Some((id, refresh.clone()));
                    (id, refresh)
                }
            }
        };

        let result = refresh.await;

        let mut slot = self.lock();
        if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
            *slot = None;
        }

        result
    }

    /// Whether a refresh is outstanding.
    pub fn is_refreshing(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, InFlight<T>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Send + Sync + 'static> Default for RefreshCoordinator<T> {
    fn default() -> Self {
        Self::new()
    }
}
