// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::ids::LeadId;
use crate::taxonomy::{StatusTaxonomy, TaxonomyEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigatorMode {
    MainList,
    SubList,
    SearchResults,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigatorState {
    pub open_row: LeadId,
    pub mode: NavigatorMode,
    pub selected_main: Option<String>,
    pub search_term: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissReason {
    OutsideClick,
    Escape,
    ScrollOutside,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigatorCommand {
    Open(LeadId),
    Search(String),
    SelectMain(String),
    SelectSub(String),
    SelectSearchResult(TaxonomyEntry),
    Back,
    Dismiss(DismissReason),
    Scroll { inside: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCommit {
    pub row: LeadId,
    pub status: String,
    pub sub_status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigatorEvent {
    Opened(LeadId),
    ModeChanged(NavigatorMode),
    Committed(StatusCommit),
    Closed,
}

/// Status cell editor. `None` state means the navigator is closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusNavigator {
    state: Option<NavigatorState>,
}

impl StatusNavigator {
    pub fn state(&self) -> Option<&NavigatorState> {
        self.state.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    pub fn mode(&self) -> Option<NavigatorMode> {
        self.state.as_ref().map(|state| state.mode)
    }

    pub fn dispatch(
        &mut self,
        taxonomy: &StatusTaxonomy,
        command: NavigatorCommand,
    ) -> Vec<NavigatorEvent> {
        if let NavigatorCommand::Open(row) = command {
            self.state = Some(NavigatorState {
                open_row: row.clone(),
                mode: NavigatorMode::MainList,
                selected_main: None,
                search_term: String::new(),
            });
            return vec![
                NavigatorEvent::Opened(row),
                NavigatorEvent::ModeChanged(NavigatorMode::MainList),
            ];
        }

        let Some(state) = self.state.as_mut() else {
            return Vec::new();
        };

        match command {
            NavigatorCommand::Open(_) => Vec::new(),
            NavigatorCommand::Search(term) => {
                if term.trim().is_empty() {
                    state.search_term.clear();
                    let mode = if state.selected_main.is_some() {
                        NavigatorMode::SubList
                    } else {
                        NavigatorMode::MainList
                    };
                    return set_mode(state, mode);
                }
                state.search_term = term;
                set_mode(state, NavigatorMode::SearchResults)
            }
            NavigatorCommand::SelectMain(main) => {
                state.search_term.clear();
                self.select_main(taxonomy, main)
            }
            NavigatorCommand::SelectSub(sub) => {
                if state.mode != NavigatorMode::SubList {
                    return Vec::new();
                }
                let Some(main) = state.selected_main.clone() else {
                    return Vec::new();
                };
                if !taxonomy.sub_statuses(&main).contains(&sub) {
                    return Vec::new();
                }
                self.commit(main, sub)
            }
            NavigatorCommand::SelectSearchResult(entry) => match entry {
                TaxonomyEntry::Main(main) => {
                    state.search_term.clear();
                    self.select_main(taxonomy, main)
                }
                TaxonomyEntry::Sub { main, sub } => self.commit(main, sub),
            },
            NavigatorCommand::Back => match state.mode {
                NavigatorMode::SubList => {
                    state.selected_main = None;
                    state.search_term.clear();
                    set_mode(state, NavigatorMode::MainList)
                }
                NavigatorMode::SearchResults => {
                    state.search_term.clear();
                    let mode = if state.selected_main.is_some() {
                        NavigatorMode::SubList
                    } else {
                        NavigatorMode::MainList
                    };
                    set_mode(state, mode)
                }
                NavigatorMode::MainList => Vec::new(),
            },
            NavigatorCommand::Dismiss(_) => self.close(),
            NavigatorCommand::Scroll { inside: true } => Vec::new(),
            NavigatorCommand::Scroll { inside: false } => self.close(),
        }
    }

    /// Entries the open navigator should list right now.
    pub fn entries(&self, taxonomy: &StatusTaxonomy) -> Vec<TaxonomyEntry> {
        let Some(state) = self.state.as_ref() else {
            return Vec::new();
        };
        match state.mode {
            NavigatorMode::MainList => taxonomy
                .main_statuses()
                .map(|main| TaxonomyEntry::Main(main.to_owned()))
                .collect(),
            NavigatorMode::SubList => {
                let Some(main) = state.selected_main.as_deref() else {
                    return Vec::new();
                };
                taxonomy
                    .sub_statuses(main)
                    .iter()
                    .map(|sub| TaxonomyEntry::Sub {
                        main: main.to_owned(),
                        sub: sub.clone(),
                    })
                    .collect()
            }
            NavigatorMode::SearchResults => taxonomy.search(&state.search_term),
        }
    }

    fn select_main(&mut self, taxonomy: &StatusTaxonomy, main: String) -> Vec<NavigatorEvent> {
        if !taxonomy.has_main(&main) {
            return Vec::new();
        }
        if taxonomy.sub_statuses(&main).is_empty() {
            let sub = main.clone();
            return self.commit(main, sub);
        }
        let Some(state) = self.state.as_mut() else {
            return Vec::new();
        };
        state.selected_main = Some(main);
        set_mode(state, NavigatorMode::SubList)
    }

    fn commit(&mut self, status: String, sub_status: String) -> Vec<NavigatorEvent> {
        let Some(state) = self.state.take() else {
            return Vec::new();
        };
        vec![
            NavigatorEvent::Committed(StatusCommit {
                row: state.open_row,
                status,
                sub_status,
            }),
            NavigatorEvent::Closed,
        ]
    }

    fn close(&mut self) -> Vec<NavigatorEvent> {
        match self.state.take() {
            Some(_) => vec![NavigatorEvent::Closed],
            None => Vec::new(),
        }
    }
}

fn set_mode(state: &mut NavigatorState, mode: NavigatorMode) -> Vec<NavigatorEvent> {
    if state.mode == mode {
        return Vec::new();
    }
    state.mode = mode;
    vec![NavigatorEvent::ModeChanged(mode)]
}
