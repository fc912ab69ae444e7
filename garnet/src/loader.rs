//! The deserializer: drives the scanner and assembles the node tree.
//!
//! Nodes under construction live in an arena and are addressed by index, so
//! the loader can hold on to "the container I am filling" and "the chain of
//! open containers above it" without self-referential borrows. The arena of
//! a document is materialized into the owned [`Node`] tree once the document
//! ends, and recycled for the next document.
//!
//! The loader tracks block structure with a stack of indentation frames, one
//! per open block mapping or block sequence, aligned with a stack of the
//! containers a completed child must be attached to. Flow containers do not
//! use frames; their nesting is tracked by the brackets themselves.

use std::collections::HashMap;

use garnet_scanner::{
    InputBuffer, Marker, ScalarToken, ScalarValue, ScanError, ScanErrorKind, Scanner, Token,
    TokenKind, YamlVersion,
};
use hashlink::LinkedHashMap;
use ordered_float::OrderedFloat;

use crate::node::{Anchor, AnchorRole, Node, NodeValue};
use crate::tag::{resolve_tag, DirectiveSet, TagKind};

/// Index of a node in the loader's arena.
type NodeId = usize;

/// A node under construction.
#[derive(Clone, Debug)]
struct RawNode {
    value: RawValue,
    anchor: Option<Anchor>,
    tag: Option<String>,
    version: YamlVersion,
}

/// The payload of a node under construction. Containers hold arena indices.
#[derive(Clone, Debug)]
enum RawValue {
    Null,
    Boolean(bool),
    Integer(i64),
    FloatingPoint(f64),
    String(String),
    Sequence(Vec<NodeId>),
    Mapping(Vec<(NodeId, NodeId)>),
}

/// One level of the indentation stack.
#[derive(Clone, Copy, Debug)]
struct IndentFrame {
    /// Line on which the construct owning this frame was opened.
    line: usize,
    /// Column of the construct's indentation.
    indent: usize,
    /// Whether this frame was opened by an explicit key prefix (`? `).
    explicit_key: bool,
    /// The sequence this frame belongs to, if it is a sequence frame.
    seq: Option<NodeId>,
    /// For sequence frames: a `- ` opened an entry slot that has not
    /// received a value yet. An unfilled slot resolves to null.
    entry_pending: bool,
    /// Whether popping this frame also pops the node stack.
    paired: bool,
}

/// Deserialize all documents of the given buffer.
///
/// # Errors
/// On failure, returns the error together with the index of the document in
/// which it occurred.
pub(crate) fn load_documents(input: &InputBuffer) -> Result<Vec<Node>, (usize, ScanError)> {
    Loader::new(input).load()
}

/// The YAML deserializer.
struct Loader<'input> {
    scanner: Scanner<'input>,
    /// All nodes of the document under construction.
    arena: Vec<RawNode>,
    /// The node the next completed child attaches to.
    current: NodeId,
    /// The open containers above `current`, innermost last.
    node_stack: Vec<NodeId>,
    /// The indentation frames, innermost last.
    indent_stack: Vec<IndentFrame>,
    /// Nesting depth of flow containers; mirrors the scanner's.
    flow_depth: u32,
    /// Whether a new item may be attached in the enclosing flow container
    /// without a preceding `,`.
    flow_item_allowed: bool,
    /// Single-pair mappings implicitly opened inside flow sequences
    /// (`[a: b, c]`); they close at the `,` or `]`.
    implicit_pairs: Vec<NodeId>,
    /// The directives of the document being built.
    directives: DirectiveSet,
    /// Anchor name to the arena node it was defined on. Redefinition
    /// rebinds the name.
    anchors: HashMap<String, NodeId>,
    /// An `&name` waiting for the node it applies to.
    pending_anchor: Option<String>,
    /// A `!tag` waiting for the node it applies to.
    pending_tag: Option<String>,
    /// Position of the first pending property. A node preceded by
    /// properties is positioned where its properties start, so that
    /// `&a key: value` frames at the anchor's column.
    props_mark: Option<Marker>,
    /// The index of the document being built.
    document_index: usize,
}

impl<'input> Loader<'input> {
    fn new(input: &'input InputBuffer) -> Loader<'input> {
        Loader {
            scanner: Scanner::new(input),
            arena: Vec::new(),
            current: 0,
            node_stack: Vec::new(),
            indent_stack: Vec::new(),
            flow_depth: 0,
            flow_item_allowed: false,
            implicit_pairs: Vec::new(),
            directives: DirectiveSet::new(),
            anchors: HashMap::new(),
            pending_anchor: None,
            pending_tag: None,
            props_mark: None,
            document_index: 0,
        }
    }

    /// Parse every document in the input.
    fn load(mut self) -> Result<Vec<Node>, (usize, ScanError)> {
        let mut docs = Vec::new();
        let mut tok = self.next().map_err(|e| (self.document_index, e))?;

        loop {
            match self.load_one(tok) {
                Ok((doc, terminator)) => {
                    docs.push(doc);
                    match terminator.kind {
                        TokenKind::StreamEnd => break,
                        TokenKind::DocumentEnd => {
                            self.document_index += 1;
                            let mut next = self.next().map_err(|e| (self.document_index, e))?;
                            while matches!(next.kind, TokenKind::DocumentEnd) {
                                next = self.next().map_err(|e| (self.document_index, e))?;
                            }
                            if matches!(next.kind, TokenKind::StreamEnd) {
                                break;
                            }
                            tok = next;
                        }
                        TokenKind::DocumentStart => {
                            self.document_index += 1;
                            tok = terminator;
                        }
                        _ => unreachable!("not a document terminator"),
                    }
                }
                Err(e) => return Err((self.document_index, e)),
            }
        }
        Ok(docs)
    }

    /// Parse one document: its directives, then its content.
    ///
    /// Returns the document's root node and the terminating token
    /// (`StreamEnd`, `DocumentStart` of the next document, or
    /// `DocumentEnd`).
    fn load_one(&mut self, mut tok: Token) -> Result<(Node, Token), ScanError> {
        self.directives = DirectiveSet::new();
        let mut saw_directive = false;
        loop {
            match tok.kind {
                TokenKind::VersionDirective(version) => {
                    self.directives.set_version(version, tok.span.start)?;
                    saw_directive = true;
                    tok = self.next()?;
                }
                TokenKind::TagDirective { handle, prefix } => {
                    self.directives.set_handle(handle, prefix, tok.span.start)?;
                    saw_directive = true;
                    tok = self.next()?;
                }
                TokenKind::InvalidDirective => {
                    // Unknown directives are skipped.
                    tok = self.next()?;
                }
                _ => break,
            }
        }
        if saw_directive && !matches!(tok.kind, TokenKind::DocumentStart) {
            return Err(ScanError::new_str(
                ScanErrorKind::Parse,
                tok.span.start,
                "directives must be terminated by an end of directives marker (---).",
            ));
        }
        if matches!(tok.kind, TokenKind::DocumentStart) {
            tok = self.next()?;
        }

        let terminator = self.load_content(tok)?;
        let doc = self.finish_document();
        Ok((doc, terminator))
    }

    /// The scan loop over one document's content.
    fn load_content(&mut self, first: Token) -> Result<Token, ScanError> {
        self.arena.clear();
        self.arena.push(RawNode {
            value: RawValue::Null,
            anchor: None,
            tag: None,
            version: self.directives.version(),
        });
        self.current = 0;
        self.node_stack.clear();
        self.indent_stack.clear();
        self.anchors.clear();
        self.flow_depth = 0;
        self.flow_item_allowed = false;
        self.implicit_pairs.clear();
        self.pending_anchor = None;
        self.pending_tag = None;
        self.props_mark = None;

        // A document led by a sequence entry has a sequence root.
        if matches!(first.kind, TokenKind::BlockEntry) {
            self.arena[0].value = RawValue::Sequence(Vec::new());
        }

        let mut tok = first;
        loop {
            match tok.kind {
                TokenKind::StreamEnd | TokenKind::DocumentStart | TokenKind::DocumentEnd => {
                    if self.flow_depth > 0 {
                        return Err(ScanError::new_str(
                            ScanErrorKind::Parse,
                            tok.span.start,
                            "detected an unclosed flow container.",
                        ));
                    }
                    return Ok(tok);
                }
                // Directives inside a document body carry no meaning here.
                TokenKind::VersionDirective(_)
                | TokenKind::TagDirective { .. }
                | TokenKind::InvalidDirective => {
                    tok = self.next()?;
                }
                TokenKind::Anchor(_) | TokenKind::Tag(_) => {
                    self.record_property(&tok)?;
                    tok = self.next()?;
                }
                TokenKind::Key => {
                    tok = self.handle_explicit_key(&tok)?;
                }
                TokenKind::Value => {
                    tok = self.handle_key_separator(&tok)?;
                }
                TokenKind::BlockEntry => {
                    self.handle_block_entry(&tok)?;
                    tok = self.next()?;
                }
                TokenKind::FlowSequenceStart => {
                    self.handle_flow_start(&tok, false)?;
                    tok = self.next()?;
                }
                TokenKind::FlowMappingStart => {
                    self.handle_flow_start(&tok, true)?;
                    tok = self.next()?;
                }
                TokenKind::FlowSequenceEnd | TokenKind::FlowMappingEnd => {
                    self.handle_flow_end();
                    tok = self.next()?;
                }
                TokenKind::FlowEntry => {
                    self.close_implicit_pair();
                    if self.flow_depth == 0 {
                        return Err(ScanError::new_str(
                            ScanErrorKind::Parse,
                            tok.span.start,
                            "A value separator(,) must not appear outside flow containers.",
                        ));
                    }
                    if self.flow_item_allowed {
                        return Err(ScanError::new_str(
                            ScanErrorKind::Parse,
                            tok.span.start,
                            "detected an empty element in a flow container.",
                        ));
                    }
                    self.flow_item_allowed = true;
                    tok = self.next()?;
                }
                TokenKind::Scalar(_) | TokenKind::Alias(_) => {
                    tok = self.handle_scalar(tok)?;
                }
            }
        }
    }

    /// Flush unfilled sequence slots and materialize the root node.
    fn finish_document(&mut self) -> Node {
        let pending: Vec<NodeId> = self
            .indent_stack
            .iter()
            .filter(|f| f.entry_pending)
            .filter_map(|f| f.seq)
            .collect();
        for seq in pending {
            let slot = self.alloc(RawValue::Null);
            if let RawValue::Sequence(ref mut items) = self.arena[seq].value {
                items.push(slot);
            }
        }
        self.materialize(0)
    }

    // ------------------------------------------------------------------
    // Token handlers.

    /// Record an anchor or tag property for the next node.
    fn record_property(&mut self, tok: &Token) -> Result<(), ScanError> {
        match &tok.kind {
            TokenKind::Anchor(name) => {
                if self.pending_anchor.is_some() {
                    return Err(ScanError::new_str(
                        ScanErrorKind::Parse,
                        tok.span.start,
                        "anchor name cannot be specified more than once to the same node.",
                    ));
                }
                self.pending_anchor = Some(name.clone());
            }
            TokenKind::Tag(text) => {
                if self.pending_tag.is_some() {
                    return Err(ScanError::new_str(
                        ScanErrorKind::Parse,
                        tok.span.start,
                        "tag name cannot be specified more than once to the same node.",
                    ));
                }
                self.pending_tag = Some(text.clone());
            }
            _ => unreachable!("not a property token"),
        }
        if self.props_mark.is_none() {
            self.props_mark = Some(tok.span.start);
        }
        Ok(())
    }

    /// Handle an explicit key prefix (`? `).
    fn handle_explicit_key(&mut self, tok: &Token) -> Result<Token, ScanError> {
        let mark = tok.span.start;
        if self.flow_depth > 0 {
            return Err(ScanError::new_str(
                ScanErrorKind::Parse,
                mark,
                "explicit keys are not supported in flow containers.",
            ));
        }

        let indent = mark.col();
        if self
            .indent_stack
            .last()
            .map_or(false, |f| indent < f.indent)
        {
            while self
                .indent_stack
                .last()
                .map_or(false, |f| f.indent >= indent)
            {
                self.pop_frame(mark)?;
            }
        }

        if self.is_null(self.current) {
            self.arena[self.current].value = RawValue::Mapping(Vec::new());
        }

        self.node_stack.push(self.current);
        self.indent_stack.push(IndentFrame {
            line: mark.line(),
            indent,
            explicit_key: true,
            seq: None,
            entry_pending: false,
            paired: true,
        });

        let next = self.next()?;
        if matches!(next.kind, TokenKind::BlockEntry) {
            // The explicit key itself is a block sequence.
            let orphan = self.alloc(RawValue::Sequence(Vec::new()));
            self.indent_stack.push(IndentFrame {
                line: next.span.start.line(),
                indent: next.span.start.col(),
                explicit_key: false,
                seq: Some(orphan),
                entry_pending: true,
                paired: false,
            });
            self.current = orphan;
            return self.next();
        }

        self.current = self.alloc(RawValue::Null);
        Ok(next)
    }

    /// Handle a `:` key separator.
    fn handle_key_separator(&mut self, tok: &Token) -> Result<Token, ScanError> {
        let old = tok.span.start;
        if self.node_stack.is_empty() {
            return Err(ScanError::new_str(
                ScanErrorKind::Parse,
                old,
                "A key separator found without key.",
            ));
        }
        if self.flow_depth > 0 {
            self.flow_item_allowed = true;
        }

        let mut next = self.next()?;

        // Properties written right after the separator belong to the value.
        let mut found_props = false;
        while matches!(next.kind, TokenKind::Anchor(_) | TokenKind::Tag(_))
            && next.span.start.line() == old.line()
        {
            self.record_property(&next)?;
            found_props = true;
            next = self.next()?;
        }
        if found_props && next.span.start.line() == old.line() {
            // The value follows its properties on the same line.
            return Ok(next);
        }

        if self.flow_depth > 0
            && matches!(
                next.kind,
                TokenKind::FlowEntry | TokenKind::FlowSequenceEnd | TokenKind::FlowMappingEnd
            )
        {
            // The value is omitted (`{a:}`); the key keeps its null
            // placeholder and the entry counts as complete.
            self.flow_item_allowed = false;
            if let Some(parent) = self.node_stack.pop() {
                self.current = parent;
            }
            return Ok(next);
        }

        let line = next.span.start.line();
        let is_implicit_same_line = line == old.line()
            && self
                .indent_stack
                .last()
                .map_or(true, |f| old.col() > f.indent);
        if is_implicit_same_line {
            return Ok(next);
        }

        if line > old.line() {
            // The value starts on a later line; its first token (or a tag
            // resolving to a mapping) decides the container shape.
            if let Some(tag) = self.pending_tag.clone() {
                if resolve_tag(&tag, &self.directives, next.span.start)? == TagKind::Mapping {
                    self.arena[self.current].value = RawValue::Mapping(Vec::new());
                    self.apply_props(self.current);
                    return Ok(next);
                }
            }
            match next.kind {
                TokenKind::BlockEntry => {
                    self.arena[self.current].value = RawValue::Sequence(Vec::new());
                    self.apply_props(self.current);
                }
                TokenKind::Key => {
                    self.arena[self.current].value = RawValue::Mapping(Vec::new());
                }
                _ => {}
            }
            return Ok(next);
        }

        // Newlines are insignificant inside flow containers; the value
        // simply follows.
        if self.flow_depth > 0 {
            return Ok(next);
        }

        // The separator closes an explicit key.
        while let Some(frame) = self.indent_stack.last() {
            if frame.explicit_key {
                break;
            }
            self.pop_frame(old)?;
        }
        if self.indent_stack.is_empty() {
            return Err(ScanError::new_str(
                ScanErrorKind::Parse,
                old,
                "A key separator found without key.",
            ));
        }

        let key = self.current;
        let Some(&parent) = self.node_stack.last() else {
            return Err(ScanError::new_str(
                ScanErrorKind::Parse,
                old,
                "A key separator found without key.",
            ));
        };
        let mapping = if self.is_sequence(parent) {
            // The explicit entry forms a mapping element of the sequence.
            let elem = self.alloc(RawValue::Mapping(Vec::new()));
            self.note_seq_append(parent);
            if let RawValue::Sequence(ref mut items) = self.arena[parent].value {
                items.push(elem);
            }
            elem
        } else {
            parent
        };

        self.check_duplicate_key(mapping, key, old)?;
        let placeholder = self.alloc(RawValue::Null);
        if let RawValue::Mapping(ref mut pairs) = self.arena[mapping].value {
            pairs.push((key, placeholder));
        } else {
            return Err(ScanError::new_str(
                ScanErrorKind::Parse,
                old,
                "A key separator found without key.",
            ));
        }
        self.node_stack.push(mapping);
        self.current = placeholder;
        if let Some(frame) = self.indent_stack.last_mut() {
            frame.explicit_key = false;
        }

        if matches!(next.kind, TokenKind::BlockEntry) {
            self.arena[self.current].value = RawValue::Sequence(Vec::new());
            self.apply_props(self.current);
        }
        Ok(next)
    }

    /// Handle a `- ` block sequence entry.
    fn handle_block_entry(&mut self, tok: &Token) -> Result<(), ScanError> {
        let mark = tok.span.start;
        if self.flow_depth > 0 {
            return Err(ScanError::new_str(
                ScanErrorKind::Parse,
                mark,
                "a block sequence entry must not appear in a flow context.",
            ));
        }
        let indent = mark.col();
        let line = mark.line();

        loop {
            if self.is_sequence(self.current) {
                let Some(frame) = self.indent_stack.last().copied() else {
                    // The root sequence gets its frame from its first entry.
                    self.indent_stack.push(IndentFrame {
                        line,
                        indent,
                        explicit_key: false,
                        seq: Some(self.current),
                        entry_pending: true,
                        paired: false,
                    });
                    return Ok(());
                };
                if frame.seq == Some(self.current) {
                    if frame.indent == indent {
                        // The next entry of this sequence. An unfilled slot
                        // from the previous entry resolves to null.
                        if frame.entry_pending {
                            let slot = self.alloc(RawValue::Null);
                            if let RawValue::Sequence(ref mut items) =
                                self.arena[self.current].value
                            {
                                items.push(slot);
                            }
                        }
                        if let Some(top) = self.indent_stack.last_mut() {
                            top.entry_pending = true;
                        }
                        return Ok(());
                    }
                    if indent > frame.indent {
                        if !frame.entry_pending {
                            return Err(ScanError::new_str(
                                ScanErrorKind::Parse,
                                mark,
                                "Detected invalid indentation.",
                            ));
                        }
                        // The pending entry is itself a sequence.
                        if let Some(top) = self.indent_stack.last_mut() {
                            top.entry_pending = false;
                        }
                        let nested = self.alloc(RawValue::Sequence(Vec::new()));
                        if let RawValue::Sequence(ref mut items) = self.arena[self.current].value {
                            items.push(nested);
                        }
                        self.node_stack.push(self.current);
                        self.current = nested;
                        self.indent_stack.push(IndentFrame {
                            line,
                            indent,
                            explicit_key: false,
                            seq: Some(nested),
                            entry_pending: true,
                            paired: true,
                        });
                        return Ok(());
                    }
                    // Dedent: close this sequence and retry.
                    self.pop_frame(mark)?;
                    continue;
                }
                // A sequence without a frame yet (created as a mapping value
                // or an explicit key); it may sit at the same indent as its
                // parent's keys.
                if indent >= frame.indent {
                    let paired = !self.node_stack.is_empty();
                    self.indent_stack.push(IndentFrame {
                        line,
                        indent,
                        explicit_key: false,
                        seq: Some(self.current),
                        entry_pending: true,
                        paired,
                    });
                    return Ok(());
                }
                self.pop_frame(mark)?;
                continue;
            }

            // Current is a mapping or scalar: close it and retry.
            if self.indent_stack.is_empty() {
                return Err(ScanError::new_str(
                    ScanErrorKind::Parse,
                    mark,
                    "Invalid sequence block prefix(- ) found.",
                ));
            }
            self.pop_frame(mark)?;
        }
    }

    /// Handle a `[` or `{`.
    fn handle_flow_start(&mut self, tok: &Token, mapping: bool) -> Result<(), ScanError> {
        let mark = tok.span.start;
        let container = if mapping {
            RawValue::Mapping(Vec::new())
        } else {
            RawValue::Sequence(Vec::new())
        };

        if self.flow_depth > 0 && !self.flow_item_allowed {
            return Err(ScanError::new_str(
                ScanErrorKind::Parse,
                mark,
                "detected a missing value separator (,) in a flow container.",
            ));
        }

        if self.is_sequence(self.current) {
            // A new element of the surrounding sequence.
            self.seq_entry_check(mark)?;
            let id = self.alloc(container);
            if let RawValue::Sequence(ref mut items) = self.arena[self.current].value {
                items.push(id);
            }
            self.node_stack.push(self.current);
            self.current = id;
            self.apply_props(id);
        } else if self.is_null(self.current) {
            // The container fills the pending slot in place.
            self.arena[self.current].value = container;
            self.apply_props(self.current);
        } else if self.is_mapping(self.current) {
            return Err(ScanError::new_str(
                ScanErrorKind::Parse,
                mark,
                "a flow container must not be used as a mapping key.",
            ));
        } else {
            return Err(ScanError::new_str(
                ScanErrorKind::Parse,
                mark,
                "detected a missing key separator (:).",
            ));
        }

        self.flow_depth += 1;
        self.flow_item_allowed = true;
        Ok(())
    }

    /// Handle a `]` or `}`. The scanner has already validated the nesting.
    fn handle_flow_end(&mut self) {
        self.close_implicit_pair();
        self.flow_depth = self.flow_depth.saturating_sub(1);

        if let Some(parent) = self.node_stack.pop() {
            self.current = parent;
        }
        self.flow_item_allowed = false;
    }

    /// Return from an implicit flow pair to its surrounding sequence.
    fn close_implicit_pair(&mut self) {
        if self.implicit_pairs.last() == Some(&self.current) {
            self.implicit_pairs.pop();
            if let Some(parent) = self.node_stack.pop() {
                self.current = parent;
            }
        }
    }

    /// Handle a scalar or alias token. Returns the next token to process.
    fn handle_scalar(&mut self, tok: Token) -> Result<Token, ScanError> {
        let mark = tok.span.start;
        // A node preceded by properties on the same line is positioned at
        // its first property, so `&a key: value` frames at the anchor.
        let effective = self
            .props_mark
            .filter(|m| m.line() == mark.line())
            .unwrap_or(mark);
        let line = effective.line();
        let indent = effective.col();

        // Properties written on an earlier line than the scalar belong to
        // the container the scalar opens, not to the scalar itself:
        //
        //   parent: &anchor
        //     key: value
        //
        // anchors the nested mapping. Stash them until the shape is known.
        let stashed_props = if self.is_null(self.current)
            && self
                .props_mark
                .map_or(false, |m| m.line() < mark.line())
        {
            let anchor = self.pending_anchor.take();
            let tag = self.pending_tag.take();
            let prop_mark = self.props_mark.take();
            Some((anchor, tag, prop_mark))
        } else {
            None
        };

        let node = self.create_scalar_node(&tok)?;

        if let Some((anchor, tag, prop_mark)) = stashed_props {
            let next = self.next()?;
            if matches!(next.kind, TokenKind::Value) && next.span.start.line() == line {
                let nested = self.flow_depth == 0
                    && self
                        .indent_stack
                        .last()
                        .map_or(true, |f| indent > f.indent);
                self.pending_anchor = anchor;
                self.pending_tag = tag;
                if nested {
                    // The scalar is the first key of a new mapping; the
                    // stashed properties apply to that mapping.
                    self.arena[self.current].value = RawValue::Mapping(Vec::new());
                    self.apply_props(self.current);
                    self.add_new_key(node, indent, line, mark)?;
                    return Ok(next);
                }
                // A sibling key: the annotated value stays null.
                self.apply_props(self.current);
                match self.node_stack.pop() {
                    Some(parent) => self.current = parent,
                    None => {
                        return Err(ScanError::new_str(
                            ScanErrorKind::Parse,
                            mark,
                            "A key separator found without key.",
                        ));
                    }
                }
                self.add_new_key(node, indent, line, mark)?;
                return Ok(next);
            }
            // A plain value: the properties were for this node after all.
            self.pending_anchor = anchor;
            self.pending_tag = tag;
            self.props_mark = prop_mark;
            if self.pending_tag.is_some() && matches!(tok.kind, TokenKind::Alias(_)) {
                return Err(ScanError::new_str(
                    ScanErrorKind::Parse,
                    mark,
                    "Tag cannot be specified to alias nodes",
                ));
            }
            self.apply_props(node);
            return self.place_scalar(node, next, indent, line, mark);
        }

        if self.is_mapping(self.current) {
            // Key position.
            if self.flow_depth > 0 {
                if !self.flow_item_allowed {
                    return Err(ScanError::new_str(
                        ScanErrorKind::Parse,
                        mark,
                        "detected a missing value separator (,) in a flow container.",
                    ));
                }
                self.flow_item_allowed = false;
            }
            self.add_new_key(node, indent, line, mark)?;
            let next = self.next()?;
            match next.kind {
                TokenKind::Value => Ok(next),
                TokenKind::FlowEntry | TokenKind::FlowSequenceEnd | TokenKind::FlowMappingEnd
                    if self.flow_depth > 0 =>
                {
                    // A lone key in a flow mapping gets a null value.
                    if let Some(parent) = self.node_stack.pop() {
                        self.current = parent;
                    }
                    Ok(next)
                }
                _ => Err(ScanError::new_str(
                    ScanErrorKind::Parse,
                    next.span.start,
                    "detected a missing key separator (:).",
                )),
            }
        } else {
            let next = self.next()?;
            self.place_scalar(node, next, indent, line, mark)
        }
    }

    /// Attach a completed node outside key position, given the token that
    /// follows it. Returns that token for the main loop.
    fn place_scalar(
        &mut self,
        node: NodeId,
        next: Token,
        indent: usize,
        line: usize,
        mark: Marker,
    ) -> Result<Token, ScanError> {
        if matches!(next.kind, TokenKind::Value) {
            if line != next.span.start.line() {
                // The node completes before an explicit `:` on a later
                // line; it is (part of) an explicit key.
                self.assign_node_value(node, mark)?;
                if self
                    .indent_stack
                    .last()
                    .map_or(false, |f| !f.explicit_key)
                {
                    self.pop_frame(mark)?;
                }
                return Ok(next);
            }
            if self.is_sequence(self.current) {
                // An implicit pair inside a sequence (`- a: 1`).
                self.add_new_key(node, indent, line, mark)?;
                return Ok(next);
            }
            if self.flow_depth == 0 {
                if let Some(frame) = self.indent_stack.last() {
                    if indent <= frame.indent {
                        // The pending value stays null; this key belongs to
                        // an enclosing mapping:
                        //
                        //   foo:
                        //   bar: 1
                        match self.node_stack.pop() {
                            Some(parent) => self.current = parent,
                            None => {
                                return Err(ScanError::new_str(
                                    ScanErrorKind::Parse,
                                    mark,
                                    "A key separator found without key.",
                                ));
                            }
                        }
                        self.add_new_key(node, indent, line, mark)?;
                        return Ok(next);
                    }
                    if frame.line == line && !frame.explicit_key {
                        return Err(ScanError::new_str(
                            ScanErrorKind::Parse,
                            mark,
                            "multiple mapping keys are specified on the same line.",
                        ));
                    }
                }
            }
            // The scalar opens a nested mapping as its first key.
            self.arena[self.current].value = RawValue::Mapping(Vec::new());
            self.add_new_key(node, indent, line, mark)?;
            Ok(next)
        } else {
            if !self.is_sequence(self.current) && self.flow_depth == 0 {
                if let Some(frame) = self.indent_stack.last() {
                    if line > frame.line && indent <= frame.indent {
                        return Err(ScanError::new_str(
                            ScanErrorKind::Parse,
                            mark,
                            "detected a missing key separator (:).",
                        ));
                    }
                }
            }
            self.assign_node_value(node, mark)?;
            Ok(next)
        }
    }

    // ------------------------------------------------------------------
    // Node construction.

    /// Build the node for a scalar or alias token, applying pending
    /// properties and the directive set.
    fn create_scalar_node(&mut self, tok: &Token) -> Result<NodeId, ScanError> {
        let mark = tok.span.start;
        match &tok.kind {
            TokenKind::Alias(name) => {
                if self.pending_tag.is_some() {
                    return Err(ScanError::new_str(
                        ScanErrorKind::Parse,
                        mark,
                        "Tag cannot be specified to alias nodes",
                    ));
                }
                let Some(&target) = self.anchors.get(name) else {
                    return Err(ScanError::new_str(
                        ScanErrorKind::Parse,
                        mark,
                        "The given anchor name must appear prior to the alias node.",
                    ));
                };
                let id = self.clone_subtree(target);
                self.arena[id].anchor = Some(Anchor {
                    name: name.clone(),
                    role: AnchorRole::Alias,
                });
                if let Some(anchor) = self.pending_anchor.take() {
                    // An alias node may itself be re-anchored.
                    self.arena[id].anchor = Some(Anchor {
                        name: anchor.clone(),
                        role: AnchorRole::Anchor,
                    });
                    self.anchors.insert(anchor, id);
                }
                self.props_mark = None;
                Ok(id)
            }
            TokenKind::Scalar(scalar) => {
                let value = if let Some(tag) = self.pending_tag.clone() {
                    let kind = resolve_tag(&tag, &self.directives, mark)?;
                    self.forced_scalar_value(scalar, kind, mark)?
                } else {
                    bare_scalar_value(scalar)
                };
                let id = self.alloc(value);
                self.apply_props(id);
                Ok(id)
            }
            _ => unreachable!("not a scalar token"),
        }
    }

    /// Re-interpret a scalar's text as the kind its tag forces.
    fn forced_scalar_value(
        &self,
        scalar: &ScalarToken,
        kind: TagKind,
        mark: Marker,
    ) -> Result<RawValue, ScanError> {
        let text = scalar.text.as_str();
        let conversion_error = |what: &str| {
            ScanError::new(
                ScanErrorKind::Parse,
                mark,
                format!("failed to convert \"{text}\" to {what} as required by the specified tag."),
            )
        };
        match kind {
            TagKind::Null => match text {
                "~" | "null" | "Null" | "NULL" | "" => Ok(RawValue::Null),
                _ => Err(conversion_error("a null value")),
            },
            TagKind::Boolean => match text {
                "true" | "True" | "TRUE" => Ok(RawValue::Boolean(true)),
                "false" | "False" | "FALSE" => Ok(RawValue::Boolean(false)),
                _ => Err(conversion_error("a boolean")),
            },
            TagKind::Integer => parse_integer(text)
                .ok_or_else(|| conversion_error("an integer"))?
                .map(RawValue::Integer)
                .map_err(|()| {
                    ScanError::new(
                        ScanErrorKind::OutOfRange,
                        mark,
                        format!("integer value out of range of 64-bit signed integers: {text}"),
                    )
                }),
            TagKind::FloatingPoint => match parse_float(text) {
                Some(f) => Ok(RawValue::FloatingPoint(f)),
                None => Err(conversion_error("a float number")),
            },
            TagKind::String | TagKind::NonSpecific => Ok(RawValue::String(text.to_owned())),
            TagKind::Custom => Ok(bare_scalar_value(scalar)),
            TagKind::Sequence | TagKind::Mapping => Err(ScanError::new_str(
                ScanErrorKind::Parse,
                mark,
                "a collection tag cannot be applied to a scalar node.",
            )),
        }
    }

    /// Apply pending anchor/tag properties to a completed node.
    fn apply_props(&mut self, id: NodeId) {
        if let Some(name) = self.pending_anchor.take() {
            self.arena[id].anchor = Some(Anchor {
                name: name.clone(),
                role: AnchorRole::Anchor,
            });
            self.anchors.insert(name, id);
        }
        if let Some(tag) = self.pending_tag.take() {
            self.arena[id].tag = Some(tag);
        }
        self.props_mark = None;
    }

    /// Add a key to the mapping at `current`, moving back across the
    /// indentation stack first if the key is less indented.
    fn add_new_key(
        &mut self,
        key: NodeId,
        indent: usize,
        line: usize,
        mark: Marker,
    ) -> Result<(), ScanError> {
        if self.flow_depth == 0 {
            let needs_move = self
                .indent_stack
                .last()
                .map_or(false, |f| indent < f.indent || (f.seq.is_some() && indent == f.indent));
            if needs_move {
                while let Some(frame) = self.indent_stack.last() {
                    if frame.indent < indent || (frame.indent == indent && frame.seq.is_none()) {
                        break;
                    }
                    self.pop_frame(mark)?;
                }
                match self.indent_stack.last() {
                    Some(frame) if frame.indent == indent && frame.seq.is_none() => {}
                    _ => {
                        return Err(ScanError::new_str(
                            ScanErrorKind::Parse,
                            mark,
                            "Detected invalid indentation.",
                        ));
                    }
                }
            }
        }

        if self.is_sequence(self.current) {
            // The key opens a mapping element of the sequence.
            if self.flow_depth > 0 {
                if !self.flow_item_allowed {
                    return Err(ScanError::new_str(
                        ScanErrorKind::Parse,
                        mark,
                        "detected a missing value separator (,) in a flow container.",
                    ));
                }
                self.flow_item_allowed = false;
            }
            self.seq_entry_check(mark)?;
            let elem = self.alloc(RawValue::Mapping(Vec::new()));
            if let RawValue::Sequence(ref mut items) = self.arena[self.current].value {
                items.push(elem);
            }
            self.node_stack.push(self.current);
            self.current = elem;
            if self.flow_depth > 0 {
                // The pair closes at the surrounding `,` or `]`.
                self.implicit_pairs.push(elem);
            }
        }

        let is_empty = match &self.arena[self.current].value {
            RawValue::Mapping(pairs) => pairs.is_empty(),
            _ => {
                return Err(ScanError::new_str(
                    ScanErrorKind::Parse,
                    mark,
                    "detected a mapping key outside a mapping node.",
                ));
            }
        };
        if is_empty {
            if self.flow_depth == 0 {
                self.indent_stack.push(IndentFrame {
                    line,
                    indent,
                    explicit_key: false,
                    seq: None,
                    entry_pending: false,
                    paired: true,
                });
            }
        } else {
            self.check_duplicate_key(self.current, key, mark)?;
        }

        let placeholder = self.alloc(RawValue::Null);
        if let RawValue::Mapping(ref mut pairs) = self.arena[self.current].value {
            pairs.push((key, placeholder));
        }
        self.node_stack.push(self.current);
        self.current = placeholder;
        Ok(())
    }

    /// Attach a completed node as a value: append it to the sequence at
    /// `current`, or fill the pending slot.
    fn assign_node_value(&mut self, value: NodeId, mark: Marker) -> Result<(), ScanError> {
        if self.is_sequence(self.current) {
            if self.flow_depth == 0 {
                self.seq_entry_check(mark)?;
            } else {
                if !self.flow_item_allowed {
                    return Err(ScanError::new_str(
                        ScanErrorKind::Parse,
                        mark,
                        "detected a missing value separator (,) in a flow container.",
                    ));
                }
                self.flow_item_allowed = false;
            }
            if let RawValue::Sequence(ref mut items) = self.arena[self.current].value {
                items.push(value);
            }
            return Ok(());
        }

        if !self.is_null(self.current) {
            return Err(ScanError::new_str(
                ScanErrorKind::Parse,
                mark,
                "detected a missing key separator (:).",
            ));
        }
        self.arena[self.current] = self.arena[value].clone();

        if self.flow_depth > 0 {
            self.flow_item_allowed = false;
            if let Some(parent) = self.node_stack.pop() {
                self.current = parent;
            }
        } else if self
            .indent_stack
            .last()
            .map_or(false, |f| !f.explicit_key)
        {
            if let Some(parent) = self.node_stack.pop() {
                self.current = parent;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Stack plumbing.

    /// Pop one indentation frame, flushing an unfilled sequence slot and
    /// moving back to the parent container when the frame owns one.
    fn pop_frame(&mut self, mark: Marker) -> Result<(), ScanError> {
        let frame = self
            .indent_stack
            .pop()
            .expect("pop_frame on an empty indent stack");
        if let Some(seq) = frame.seq {
            if frame.entry_pending {
                let slot = self.alloc(RawValue::Null);
                if let RawValue::Sequence(ref mut items) = self.arena[seq].value {
                    items.push(slot);
                }
            }
        }
        if frame.paired {
            match self.node_stack.pop() {
                Some(parent) => self.current = parent,
                None => {
                    return Err(ScanError::new_str(
                        ScanErrorKind::Parse,
                        mark,
                        "Detected invalid indentation.",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Consume the pending entry slot of the block sequence at `current`.
    fn seq_entry_check(&mut self, mark: Marker) -> Result<(), ScanError> {
        if self.flow_depth > 0 {
            return Ok(());
        }
        let current = self.current;
        match self
            .indent_stack
            .iter_mut()
            .rev()
            .find(|f| f.seq == Some(current))
        {
            Some(frame) if frame.entry_pending => {
                frame.entry_pending = false;
                Ok(())
            }
            _ => Err(ScanError::new_str(
                ScanErrorKind::Parse,
                mark,
                "detected a missing sequence entry prefix (- ).",
            )),
        }
    }

    /// Clear the pending-entry flag of the sequence after appending to it.
    fn note_seq_append(&mut self, seq: NodeId) {
        if let Some(frame) = self
            .indent_stack
            .iter_mut()
            .rev()
            .find(|f| f.seq == Some(seq))
        {
            frame.entry_pending = false;
        }
    }

    /// Reject a key equal to one already present in the mapping.
    fn check_duplicate_key(
        &self,
        mapping: NodeId,
        key: NodeId,
        mark: Marker,
    ) -> Result<(), ScanError> {
        if let RawValue::Mapping(pairs) = &self.arena[mapping].value {
            if pairs.iter().any(|&(k, _)| self.node_eq(k, key)) {
                return Err(ScanError::new_str(
                    ScanErrorKind::Parse,
                    mark,
                    "Detected duplication in mapping keys.",
                ));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Arena plumbing.

    fn next(&mut self) -> Result<Token, ScanError> {
        self.scanner.next_token()
    }

    fn alloc(&mut self, value: RawValue) -> NodeId {
        self.arena.push(RawNode {
            value,
            anchor: None,
            tag: None,
            version: self.directives.version(),
        });
        self.arena.len() - 1
    }

    fn is_null(&self, id: NodeId) -> bool {
        matches!(self.arena[id].value, RawValue::Null)
    }

    fn is_sequence(&self, id: NodeId) -> bool {
        matches!(self.arena[id].value, RawValue::Sequence(_))
    }

    fn is_mapping(&self, id: NodeId) -> bool {
        matches!(self.arena[id].value, RawValue::Mapping(_))
    }

    /// Structural equality of two arena nodes, ignoring properties.
    fn node_eq(&self, a: NodeId, b: NodeId) -> bool {
        match (&self.arena[a].value, &self.arena[b].value) {
            (RawValue::Null, RawValue::Null) => true,
            (RawValue::Boolean(x), RawValue::Boolean(y)) => x == y,
            (RawValue::Integer(x), RawValue::Integer(y)) => x == y,
            (RawValue::FloatingPoint(x), RawValue::FloatingPoint(y)) => {
                OrderedFloat(*x) == OrderedFloat(*y)
            }
            (RawValue::String(x), RawValue::String(y)) => x == y,
            (RawValue::Sequence(x), RawValue::Sequence(y)) => {
                x.len() == y.len() && x.iter().zip(y).all(|(&i, &j)| self.node_eq(i, j))
            }
            (RawValue::Mapping(x), RawValue::Mapping(y)) => {
                x.len() == y.len()
                    && x.iter()
                        .zip(y)
                        .all(|(&(ka, va), &(kb, vb))| self.node_eq(ka, kb) && self.node_eq(va, vb))
            }
            _ => false,
        }
    }

    /// Deep-copy a subtree, returning the id of the new root.
    ///
    /// Aliases share value, not identity: the copy is entirely disjoint
    /// from the original.
    fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let template = self.arena[id].clone();
        let value = match template.value {
            RawValue::Sequence(items) => {
                let mut copies = Vec::with_capacity(items.len());
                for item in items {
                    copies.push(self.clone_subtree(item));
                }
                RawValue::Sequence(copies)
            }
            RawValue::Mapping(pairs) => {
                let mut copies = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    let k = self.clone_subtree(k);
                    let v = self.clone_subtree(v);
                    copies.push((k, v));
                }
                RawValue::Mapping(copies)
            }
            scalar => scalar,
        };
        self.arena.push(RawNode {
            value,
            anchor: template.anchor,
            tag: template.tag,
            version: template.version,
        });
        self.arena.len() - 1
    }

    /// Convert an arena subtree into the owned node tree.
    fn materialize(&self, id: NodeId) -> Node {
        let raw = &self.arena[id];
        let value = match &raw.value {
            RawValue::Null => NodeValue::Null,
            RawValue::Boolean(v) => NodeValue::Boolean(*v),
            RawValue::Integer(v) => NodeValue::Integer(*v),
            RawValue::FloatingPoint(v) => NodeValue::FloatingPoint(OrderedFloat(*v)),
            RawValue::String(v) => NodeValue::String(v.clone()),
            RawValue::Sequence(items) => {
                NodeValue::Sequence(items.iter().map(|&i| self.materialize(i)).collect())
            }
            RawValue::Mapping(pairs) => {
                let mut mapping = LinkedHashMap::with_capacity(pairs.len());
                for &(k, v) in pairs {
                    mapping.insert(self.materialize(k), self.materialize(v));
                }
                NodeValue::Mapping(mapping)
            }
        };
        Node {
            value,
            anchor: raw.anchor.clone(),
            tag: raw.tag.clone(),
            version: raw.version,
        }
    }
}

/// The arena value for a scalar token under its own classification.
fn bare_scalar_value(scalar: &ScalarToken) -> RawValue {
    match scalar.value {
        ScalarValue::Null => RawValue::Null,
        ScalarValue::Boolean(v) => RawValue::Boolean(v),
        ScalarValue::Integer(v) => RawValue::Integer(v),
        ScalarValue::FloatingPoint(v) => RawValue::FloatingPoint(v),
        ScalarValue::String => RawValue::String(scalar.text.clone()),
    }
}

/// Parse a decimal, octal (`0o`) or hexadecimal (`0x`) integer literal.
///
/// Returns `None` if the text is not integer-shaped, and `Some(Err(()))` if
/// it is but overflows an `i64`.
fn parse_integer(text: &str) -> Option<Result<i64, ()>> {
    if let Some(number) = text.strip_prefix("0x") {
        if !number.is_empty() && number.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Some(i64::from_str_radix(number, 16).map_err(|_| ()));
        }
        return None;
    }
    if let Some(number) = text.strip_prefix("0o") {
        if !number.is_empty() && number.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
            return Some(i64::from_str_radix(number, 8).map_err(|_| ()));
        }
        return None;
    }
    let digits = match text.as_bytes().first() {
        Some(b'-' | b'+') => &text.as_bytes()[1..],
        _ => text.as_bytes(),
    };
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(text.parse::<i64>().map_err(|_| ()))
}

/// Parse a float literal, including the `.inf`/`.nan` family and plain
/// integers (a forced `!!float 42` is 42.0).
fn parse_float(text: &str) -> Option<f64> {
    match text {
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => Some(f64::INFINITY),
        "-.inf" | "-.Inf" | "-.INF" => Some(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => Some(f64::NAN),
        _ if text.as_bytes().iter().any(u8::is_ascii_digit) => text.parse::<f64>().ok(),
        _ => None,
    }
}
