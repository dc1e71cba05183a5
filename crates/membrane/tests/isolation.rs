//! Two gadgets sharing one host document must not be able to observe
//! or reach each other through ids, wrappers or markup read-back.

use std::cell::RefCell;
use std::rc::Rc;

use palisade_host::{Document, Scheduler};
use palisade_membrane::{DomError, Dispatcher, GadgetScope, SchemeRewriter};
use pretty_assertions::assert_eq;

fn install_two() -> (Rc<Document>, GadgetScope, GadgetScope) {
    let document = Document::new();
    let scheduler = Rc::new(RefCell::new(Scheduler::new()));
    let dispatcher = Dispatcher::new();
    let a = dispatcher
        .install(
            "-alpha___",
            Rc::new(SchemeRewriter::web_default()),
            document.clone(),
            scheduler.clone(),
        )
        .unwrap();
    let b = dispatcher
        .install(
            "-beta___",
            Rc::new(SchemeRewriter::web_default()),
            document.clone(),
            scheduler,
        )
        .unwrap();
    (document, a, b)
}

#[test]
fn same_virtual_id_resolves_per_gadget() {
    let (document, a, b) = install_two();
    a.document()
        .body()
        .set_inner_html("<p id=\"x\">from a</p>")
        .unwrap();
    b.document()
        .body()
        .set_inner_html("<p id=\"x\">from b</p>")
        .unwrap();

    let a_node = a.document().get_element_by_id("x").unwrap();
    let b_node = b.document().get_element_by_id("x").unwrap();
    assert_eq!(a_node.inner_html().unwrap(), "from a");
    assert_eq!(b_node.inner_html().unwrap(), "from b");

    // The host sees both, under distinct physical ids.
    assert!(document.get_element_by_id("x-alpha___").is_some());
    assert!(document.get_element_by_id("x-beta___").is_some());
    assert!(document.get_element_by_id("x").is_none());
}

#[test]
fn gadgets_cannot_resolve_each_others_ids() {
    let (_document, a, b) = install_two();
    a.document()
        .body()
        .set_inner_html("<p id=\"secret\">a</p>")
        .unwrap();
    assert!(b.document().get_element_by_id("secret").is_none());
}

#[test]
fn foreign_wrappers_are_rejected_by_the_guard() {
    let (_document, a, b) = install_two();
    let foreign = b.document().create_element("p").unwrap();
    let result = a.document().body().append_child(&foreign);
    assert_eq!(result, Err(DomError::InvalidCapability));
}

#[test]
fn read_back_hides_foreign_namespace_traces() {
    let (_document, a, b) = install_two();
    // One physical container holding markup from both namespaces:
    // gadget a adopts markup, then the host moves one of b's elements
    // in underneath it.
    a.document()
        .body()
        .set_inner_html("<p id=\"mine\">a</p>")
        .unwrap();
    b.document()
        .body()
        .set_inner_html("<p id=\"theirs\">b</p>")
        .unwrap();

    let html = a.document().body().inner_html().unwrap();
    assert_eq!(html, "<p id=\"mine\">a</p>");

    // Reading across the whole body of the other gadget never leaks
    // the suffix itself.
    let foreign_view = b.document().body().inner_html().unwrap();
    assert!(!foreign_view.contains("beta___"));
}

#[test]
fn traversal_cannot_climb_out_of_the_container() {
    let (_document, a, _b) = install_two();
    a.document()
        .body()
        .set_inner_html("<div><p id=\"deep\">x</p></div>")
        .unwrap();
    let mut cursor = Some(a.document().get_element_by_id("deep").unwrap());
    let mut hops = 0;
    while let Some(node) = cursor {
        cursor = node.parent();
        hops += 1;
        assert!(hops < 10, "parent chain must terminate at the container");
    }
    // p -> div -> container, then None.
    assert_eq!(hops, 3);
}

#[test]
fn tag_queries_are_scoped_to_the_gadget_container() {
    let (_document, a, b) = install_two();
    a.document()
        .body()
        .set_inner_html("<p id=\"one\">1</p><div><p id=\"two\">2</p></div>")
        .unwrap();
    b.document()
        .body()
        .set_inner_html("<p id=\"three\">3</p>")
        .unwrap();

    let found = a.document().get_elements_by_tag_name("p").unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found.get(0).unwrap().id().unwrap(), "one");
    assert_eq!(found.get(1).unwrap().id().unwrap(), "two");

    // Unsafe tags are not even enumerable.
    assert!(a
        .document()
        .get_elements_by_tag_name("script")
        .unwrap()
        .is_empty());
}

#[test]
fn each_gadget_gets_its_own_id_class() {
    let (_document, a, b) = install_two();
    assert_eq!(a.id_class(), "alpha___");
    assert_eq!(b.id_class(), "beta___");
    assert_eq!(a.document().body().class_name().unwrap(), "alpha___");
}
