use std::{marker::PhantomData, ptr::NonNull};


/// Non-null pointer to `T`.
pub(crate) type Link<T> = Option<NonNull<T>>;

pub(crate) struct Node<T> {
    /// Pointer to the next node of the list
    pub next: Link<Self>,
    /// Pointer to the previous node of the list
    pub prev: Link<Self>,
    /// Element of the node
    pub data: T,
}

/// Intrusive doubly linked list. Nodes are never allocated by the list itself,
/// they live wherever the caller wrote them (for us, inside block headers), so
/// every operation that touches a node is `unsafe`.
///
/// Only the head is tracked. New nodes are pushed at the front, so the order
/// of the list is the order of insertion history, newest first.
pub(crate) struct List<T> {
    head: Link<Node<T>>,
    len: usize,
    marker: PhantomData<T>,
}

pub(crate) struct Iter<'a, T> {
    current: Link<Node<T>>,
    remaining: usize,
    marker: PhantomData<&'a T>,
}

impl<T> List<T> {
    pub const fn new() -> Self {
        Self {
            head: None,
            len: 0,
            marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Links `node` in front of the current head.
    ///
    /// **SAFETY**: `node` must point to a valid, initialized [`Node<T>`] that is
    /// not already a member of this list.
    pub unsafe fn push_front(&mut self, mut node: NonNull<Node<T>>) {
        unsafe {
            node.as_mut().prev = None;
            node.as_mut().next = self.head;

            if let Some(mut head) = self.head {
                head.as_mut().prev = Some(node);
            }
        }

        self.head = Some(node);
        self.len += 1;
    }

    /// Unlinks `node` from the list. Its own links are reset to `None`.
    ///
    /// **SAFETY**: `node` must be a member of this list.
    pub unsafe fn remove(&mut self, mut node: NonNull<Node<T>>) {
        unsafe {
            let next = node.as_ref().next;
            let prev = node.as_ref().prev;

            match prev {
                Some(mut prev) => prev.as_mut().next = next,
                None => self.head = next,
            }

            if let Some(mut next) = next {
                next.as_mut().prev = prev;
            }

            node.as_mut().next = None;
            node.as_mut().prev = None;
        }

        self.len -= 1;
    }

    /// Puts `new` exactly where `old` was. `old` leaves the list, `new` takes
    /// over both of its links and the neighbours point back to `new`.
    ///
    /// **SAFETY**: `old` must be a member of this list and `new` must point to a
    /// valid node that is not.
    pub unsafe fn replace(&mut self, mut old: NonNull<Node<T>>, mut new: NonNull<Node<T>>) {
        unsafe {
            let next = old.as_ref().next;
            let prev = old.as_ref().prev;

            new.as_mut().next = next;
            new.as_mut().prev = prev;

            match prev {
                Some(mut prev) => prev.as_mut().next = Some(new),
                None => self.head = Some(new),
            }

            if let Some(mut next) = next {
                next.as_mut().prev = Some(new);
            }

            old.as_mut().next = None;
            old.as_mut().prev = None;
        }
    }

    /// Iterates over the nodes themselves, not over `&T`, since the allocator
    /// needs node addresses to do anything useful.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            current: self.head,
            remaining: self.len,
            marker: PhantomData,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = NonNull<Node<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;

        unsafe {
            self.current = node.as_ref().next;
        }
        self.remaining -= 1;

        Some(node)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> IntoIterator for &'a List<T> {
    type Item = NonNull<Node<T>>;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(data: u32) -> Node<u32> {
        Node { next: None, prev: None, data }
    }

    fn collect(list: &List<u32>) -> Vec<u32> {
        list.iter().map(|n| unsafe { n.as_ref().data }).collect()
    }

    /// Walks the list and checks that every back-link matches.
    fn assert_consistent(list: &List<u32>) {
        let mut prev: Link<Node<u32>> = None;
        for n in list {
            unsafe {
                assert_eq!(n.as_ref().prev, prev);
            }
            prev = Some(n);
        }
    }

    #[test]
    fn new_list_is_empty() {
        let list: List<u32> = List::new();

        assert_eq!(list.len(), 0);
        assert!(list.head.is_none());
        assert!(list.iter().next().is_none());
    }

    #[test]
    fn push_front_orders_newest_first() {
        let mut nodes = [node(1), node(2), node(3)];
        let mut list = List::new();

        unsafe {
            for n in nodes.iter_mut() {
                list.push_front(NonNull::from(n));
            }
        }

        assert_eq!(collect(&list), vec![3, 2, 1]);
        assert_eq!(list.len(), 3);
        assert_consistent(&list);
    }

    #[test]
    fn remove_head_middle_and_tail() {
        let mut nodes = [node(1), node(2), node(3), node(4)];
        let ptrs: Vec<_> = nodes.iter_mut().map(NonNull::from).collect();
        let mut list = List::new();

        unsafe {
            for p in &ptrs {
                list.push_front(*p);
            }

            // 4 3 2 1
            list.remove(ptrs[2]);
            assert_eq!(collect(&list), vec![4, 2, 1]);
            assert_consistent(&list);

            list.remove(ptrs[3]);
            assert_eq!(collect(&list), vec![2, 1]);
            assert_consistent(&list);

            list.remove(ptrs[0]);
            assert_eq!(collect(&list), vec![2]);
            assert_consistent(&list);

            list.remove(ptrs[1]);
        }

        assert_eq!(list.len(), 0);
        assert!(list.head.is_none());
    }

    #[test]
    fn replace_keeps_position() {
        let mut nodes = [node(1), node(2), node(3), node(9)];
        let ptrs: Vec<_> = nodes.iter_mut().map(NonNull::from).collect();
        let mut list = List::new();

        unsafe {
            for p in &ptrs[..3] {
                list.push_front(*p);
            }

            list.replace(ptrs[1], ptrs[3]);
        }

        assert_eq!(collect(&list), vec![3, 9, 1]);
        assert_eq!(list.len(), 3);
        assert_consistent(&list);

        unsafe {
            list.replace(ptrs[2], ptrs[1]);
        }
        assert_eq!(collect(&list), vec![2, 9, 1]);
        assert_eq!(list.head, Some(ptrs[1]));
        assert_consistent(&list);
    }
}
