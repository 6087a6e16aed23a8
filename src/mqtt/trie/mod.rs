// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Character-prefix subscription trie with `+`/`#` wildcard matching.
//!
//! Filters are stored literally, one trie level per byte of the filter
//! string (`'+'` and `'#'` are ordinary bytes as far as insertion is
//! concerned); the wildcard behavior lives entirely in the matcher, which
//! special-cases a `'+'` or `'#'` child when it is deciding how to descend.
//! A node's `subscribers` set stands in for the `'$'` end-of-filter marker:
//! a node carries a `subscribers` set exactly when a filter terminates
//! there, which is the same invariant as an explicit sentinel child without
//! the extra indirection.

use indexmap::IndexSet;

/// A single node of the character-prefix trie.
pub struct TrieNode {
    children: Vec<(u8, Box<TrieNode>)>,
    subscribers: Option<IndexSet<u64>>,
}

impl TrieNode {
    fn new() -> Self {
        Self {
            children: Vec::new(),
            subscribers: None,
        }
    }

    fn find_child(&self, character: u8) -> Option<&TrieNode> {
        self.children
            .binary_search_by_key(&character, |(c, _)| *c)
            .ok()
            .map(|idx| &*self.children[idx].1)
    }

    fn child_or_insert(&mut self, character: u8) -> &mut TrieNode {
        match self.children.binary_search_by_key(&character, |(c, _)| *c) {
            Ok(idx) => &mut self.children[idx].1,
            Err(idx) => {
                self.children.insert(idx, (character, Box::new(TrieNode::new())));
                &mut self.children[idx].1
            }
        }
    }
}

impl Default for TrieNode {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscription index: insert topic filters, match concrete topic names.
#[derive(Default)]
pub struct Trie {
    root: TrieNode,
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session_id` under `filter`. Idempotent: subscribing the
    /// same session to the same filter twice is a no-op the second time.
    pub fn subscribe(&mut self, filter: &str, session_id: u64) {
        let mut node = &mut self.root;
        for &byte in filter.as_bytes() {
            node = node.child_or_insert(byte);
        }
        node.subscribers.get_or_insert_with(IndexSet::new).insert(session_id);
    }

    /// Remove `session_id` from `filter`'s subscriber set, if present.
    /// Missing filters and missing sessions are silently ignored. Empty
    /// branches are not pruned; that is a pure-memory optimization the spec
    /// explicitly leaves optional.
    pub fn unsubscribe(&mut self, filter: &str, session_id: u64) {
        let mut node = &mut self.root;
        for &byte in filter.as_bytes() {
            match node.children.binary_search_by_key(&byte, |(c, _)| *c) {
                Ok(idx) => node = &mut node.children[idx].1,
                Err(_) => return,
            }
        }
        if let Some(subs) = node.subscribers.as_mut() {
            subs.shift_remove(&session_id);
        }
    }

    /// Every session id subscribed to a filter matching `topic`, deduplicated.
    pub fn matching_sessions(&self, topic: &str) -> IndexSet<u64> {
        let mut acc = IndexSet::new();
        if topic.is_empty() {
            return acc;
        }
        let bytes = topic.as_bytes();
        let dollar_excluded = bytes[0] == b'$';
        explore(&self.root, bytes, 0, dollar_excluded, &mut acc);
        acc
    }
}

fn explore(node: &TrieNode, topic: &[u8], index: usize, dollar_excluded: bool, acc: &mut IndexSet<u64>) {
    if !dollar_excluded {
        if let Some(hash) = node.find_child(b'#') {
            collect_if_terminal(hash, acc);
        }
        if let Some(plus) = node.find_child(b'+') {
            let seg_end = match topic[index..].iter().position(|&b| b == b'/') {
                Some(offset) => index + offset,
                None => topic.len(),
            };
            if seg_end > index {
                continue_after_segment(plus, topic, seg_end, acc);
            }
        }
    }
    literal_walk(node, topic, index, acc);
}

fn continue_after_segment(node: &TrieNode, topic: &[u8], seg_end: usize, acc: &mut IndexSet<u64>) {
    if seg_end == topic.len() {
        collect_terminal(node, false, acc);
    } else if let Some(slash_child) = node.find_child(b'/') {
        // dollar_excluded only ever applies to the first segment of a topic,
        // so every later segment re-enters with wildcards allowed.
        explore(slash_child, topic, seg_end + 1, false, acc);
    }
}

fn literal_walk(node: &TrieNode, topic: &[u8], index: usize, acc: &mut IndexSet<u64>) {
    let mut cur = node;
    let mut i = index;
    let dollar_excluded = index == 0 && !topic.is_empty() && topic[0] == b'$';
    loop {
        if i == topic.len() {
            collect_terminal(cur, dollar_excluded, acc);
            return;
        }
        let byte = topic[i];
        if byte == b'/' {
            if let Some(slash_child) = cur.find_child(b'/') {
                explore(slash_child, topic, i + 1, false, acc);
            }
            return;
        }
        match cur.find_child(byte) {
            Some(next) => {
                cur = next;
                i += 1;
            }
            None => return,
        }
    }
}

fn collect_if_terminal(node: &TrieNode, acc: &mut IndexSet<u64>) {
    if let Some(subs) = &node.subscribers {
        acc.extend(subs.iter().copied());
    }
}

/// A node reached exactly at the end of the query is terminal both for an
/// exact filter match and for a trailing `.../#` one level up: MQTT's `#`
/// matches its parent level with nothing following, e.g. `"a/#"` matches
/// topic `"a"` and not just `"a/..."`.
fn collect_terminal(node: &TrieNode, dollar_excluded: bool, acc: &mut IndexSet<u64>) {
    collect_if_terminal(node, acc);
    if !dollar_excluded {
        if let Some(slash) = node.find_child(b'/') {
            if let Some(hash) = slash.find_child(b'#') {
                collect_if_terminal(hash, acc);
            }
        }
    }
}
