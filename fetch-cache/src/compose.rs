use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::error::Error;
use crate::fetch::{Fetch, FetchOptions, FetchState};
use crate::orchestrator::{FetchContext, FetchHandle};

type CombinedListener = Arc<dyn Fn(&[FetchState]) + Send + Sync>;

struct FetchAllInner {
    members: Vec<Fetch>,
    states: Mutex<Vec<FetchState>>,
    listeners: Mutex<Vec<CombinedListener>>,
    attached: AtomicBool,
}

/// Several independent requests observed as one ordered array of states.
///
/// Each member is deduplicated and cached under its own key. The combined
/// listeners fire on every change of any member, carrying all states in
/// input order. A failing member never blocks the others.
#[derive(Clone)]
pub struct FetchAll {
    inner: Arc<FetchAllInner>,
}

impl FetchAll {
    pub fn new(context: &FetchContext, requests: Vec<FetchOptions>) -> Self {
        let members: Vec<Fetch> = requests
            .into_iter()
            .map(|options| Fetch::new(context, options))
            .collect();
        let states = members.iter().map(Fetch::state).collect();
        Self {
            inner: Arc::new(FetchAllInner {
                members,
                states: Mutex::new(states),
                listeners: Mutex::new(Vec::new()),
                attached: AtomicBool::new(false),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.members.is_empty()
    }

    pub fn states(&self) -> Vec<FetchState> {
        self.inner
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn member(&self, index: usize) -> Option<&Fetch> {
        self.inner.members.get(index)
    }

    /// Register a combined listener. The first one attaches to every member,
    /// which starts the members that invoke automatically.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&[FetchState]) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));

        if self.inner.attached.swap(true, Ordering::SeqCst) {
            return;
        }
        for (index, member) in self.inner.members.iter().enumerate() {
            let all = Arc::downgrade(&self.inner);
            member.subscribe(move |state| on_member_change(&all, index, state));
        }
    }

    /// Manually (re-)invoke one member.
    pub fn fetch(&self, index: usize) -> Result<FetchHandle, Error> {
        self.member(index).map(Fetch::fetch).ok_or(Error::MemberOutOfRange {
            index,
            len: self.len(),
        })
    }

    /// Wait for every member to stop fetching.
    pub async fn settled(&self) -> Vec<FetchState> {
        join_all(self.inner.members.iter().map(|member| member.settled())).await
    }
}

fn on_member_change(all: &Weak<FetchAllInner>, index: usize, state: &FetchState) {
    let Some(all) = all.upgrade() else {
        return;
    };

    let snapshot = {
        let mut states = all.states.lock().unwrap_or_else(PoisonError::into_inner);
        states[index] = state.clone();
        states.clone()
    };
    let listeners: Vec<CombinedListener> = all
        .listeners
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    for listener in listeners {
        listener(&snapshot);
    }
}

impl FetchContext {
    pub fn compose(&self, requests: Vec<FetchOptions>) -> FetchAll {
        FetchAll::new(self, requests)
    }
}
